//! Equity dimensions, metric polarity, and the per-operation orientation flag.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// The four equity dimensions, in their canonical order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Dimension {
    Responsibility,
    Capacity,
    Needs,
    Engagement,
}

impl Dimension {
    /// Canonical order; `index()` is the position in this array.
    pub const ALL: [Dimension; 4] = [
        Dimension::Responsibility,
        Dimension::Capacity,
        Dimension::Needs,
        Dimension::Engagement,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Dimension::Responsibility => 0,
            Dimension::Capacity => 1,
            Dimension::Needs => 2,
            Dimension::Engagement => 3,
        }
    }

    /// Display label ("Responsibility", ...).
    pub const fn label(self) -> &'static str {
        match self {
            Dimension::Responsibility => "Responsibility",
            Dimension::Capacity => "Capacity",
            Dimension::Needs => "Needs",
            Dimension::Engagement => "Engagement",
        }
    }

    /// Wire token ("responsibility", ...).
    pub const fn token(self) -> &'static str {
        match self {
            Dimension::Responsibility => "responsibility",
            Dimension::Capacity => "capacity",
            Dimension::Needs => "needs",
            Dimension::Engagement => "engagement",
        }
    }

    /// Polarity a metric inherits when its config does not name one.
    /// Larger emissions or income mean a smaller recipient share.
    pub const fn default_polarity(self) -> Polarity {
        match self {
            Dimension::Responsibility | Dimension::Capacity => Polarity::Descending,
            Dimension::Needs | Dimension::Engagement => Polarity::Ascending,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Dimension {
    type Err = ConfigurationError;

    /// Accepts the wire token or the label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Dimension::ALL
            .into_iter()
            .find(|d| d.token().eq_ignore_ascii_case(t))
            .ok_or_else(|| ConfigurationError::UnknownDimension(s.to_string()))
    }
}

/// Direction in which a raw indicator value maps to an equity share.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Polarity {
    /// Larger raw value → larger share (direct proportion).
    Ascending,
    /// Larger raw value → smaller share (proportion of reciprocals).
    Descending,
}

impl Polarity {
    pub const fn flipped(self) -> Self {
        match self {
            Polarity::Ascending => Polarity::Descending,
            Polarity::Descending => Polarity::Ascending,
        }
    }

    /// True when normalization goes through `1 / value`.
    pub const fn is_reciprocal(self) -> bool {
        matches!(self, Polarity::Descending)
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Ascending => f.write_str("ascending"),
            Polarity::Descending => f.write_str("descending"),
        }
    }
}

/// Per-operation polarity flag. Contribution reads the same indicators as
/// allocation with the opposite direction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
pub enum Orientation {
    #[default]
    AsRegistered,
    Inverted,
}

impl Orientation {
    #[inline]
    pub const fn apply(self, p: Polarity) -> Polarity {
        match self {
            Orientation::AsRegistered => p,
            Orientation::Inverted => p.flipped(),
        }
    }
}

const CONTRIBUTION_DIMENSIONS: [Dimension; 2] = [Dimension::Responsibility, Dimension::Capacity];

/// Which side of the ledger a computation produces.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Mode {
    /// Recipient allocation over non-donor countries, all four dimensions.
    Allocation,
    /// Donor contribution over contributor-eligible countries, Responsibility and Capacity only.
    Contribution,
}

impl Mode {
    /// Dimensions that take part in the weighted score for this mode.
    pub fn dimensions(self) -> &'static [Dimension] {
        match self {
            Mode::Allocation => &Dimension::ALL,
            Mode::Contribution => &CONTRIBUTION_DIMENSIONS,
        }
    }

    pub const fn orientation(self) -> Orientation {
        match self {
            Mode::Allocation => Orientation::AsRegistered,
            Mode::Contribution => Orientation::Inverted,
        }
    }

    /// Name of the monetary column in result tables.
    pub const fn amount_column(self) -> &'static str {
        match self {
            Mode::Allocation => "Allocation",
            Mode::Contribution => "Contribution",
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Mode::Allocation => "allocation",
            Mode::Contribution => "contribution",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
