//! Recurrence cadence model.

use serde::{Deserialize, Serialize};

/// Interval between two occurrences of a recurring template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cadence {
    #[serde(rename = "mensuel")]
    Monthly,
    #[serde(rename = "trimestriel")]
    Quarterly,
    #[serde(rename = "annuel")]
    Annual,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Monthly => "mensuel",
            Cadence::Quarterly => "trimestriel",
            Cadence::Annual => "annuel",
        }
    }

    /// Number of calendar months one step of this cadence covers.
    pub fn months(&self) -> u32 {
        match self {
            Cadence::Monthly => 1,
            Cadence::Quarterly => 3,
            Cadence::Annual => 12,
        }
    }
}

/// Value of the `is_recurring` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Recurrence {
    OneShot,
    Recurring(Cadence),
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::OneShot => "oneshot",
            Recurrence::Recurring(cadence) => cadence.as_str(),
        }
    }

    /// Lenient parse used for rows read back from storage; unknown values are
    /// treated as one-shot so they are never picked up for generation.
    pub fn from_string(s: &str) -> Self {
        Self::parse(s).unwrap_or(Recurrence::OneShot)
    }

    /// Strict parse used for client input.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "oneshot" => Some(Recurrence::OneShot),
            "mensuel" => Some(Recurrence::Recurring(Cadence::Monthly)),
            "trimestriel" => Some(Recurrence::Recurring(Cadence::Quarterly)),
            "annuel" => Some(Recurrence::Recurring(Cadence::Annual)),
            _ => None,
        }
    }

    pub fn cadence(&self) -> Option<Cadence> {
        match self {
            Recurrence::OneShot => None,
            Recurrence::Recurring(cadence) => Some(*cadence),
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Recurrence::Recurring(_))
    }
}

impl TryFrom<String> for Recurrence {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Recurrence::parse(&value).ok_or_else(|| format!("Unknown recurrence: {}", value))
    }
}

impl From<Recurrence> for String {
    fn from(value: Recurrence) -> Self {
        value.as_str().to_string()
    }
}
