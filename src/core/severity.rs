use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Score at or above which a detection is treated as severe.
pub const SEVERE_SCORE: f64 = 0.85;
/// Score at or above which a detection is treated as moderate.
pub const MODERATE_SCORE: f64 = 0.60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Secondary,
    Warning,
    Danger,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Danger => "danger",
            Severity::Warning => "warning",
            Severity::Secondary => "secondary",
        }
    }

    /// Operator-facing bucket name.
    pub const fn bucket(self) -> &'static str {
        match self {
            Severity::Danger => "severe",
            Severity::Warning => "moderate",
            Severity::Secondary => "minor",
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score >= SEVERE_SCORE {
            Severity::Danger
        } else if score >= MODERATE_SCORE {
            Severity::Warning
        } else {
            Severity::Secondary
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "danger" | "severe" | "high" => Ok(Severity::Danger),
            "warning" | "moderate" | "medium" => Ok(Severity::Warning),
            "secondary" | "minor" | "low" => Ok(Severity::Secondary),
            other => Err(format!(
                "unknown severity: {other} (expected danger|warning|secondary)"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(default)]
    pub severe: u32,
    #[serde(default)]
    pub moderate: u32,
    #[serde(default)]
    pub minor: u32,
}

impl SeverityCounts {
    pub fn tally<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        let mut counts = Self::default();
        for severity in severities {
            counts.add(severity);
        }
        counts
    }

    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Danger => self.severe = self.severe.saturating_add(1),
            Severity::Warning => self.moderate = self.moderate.saturating_add(1),
            Severity::Secondary => self.minor = self.minor.saturating_add(1),
        }
    }

    pub fn total(&self) -> u32 {
        self.severe
            .saturating_add(self.moderate)
            .saturating_add(self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_thresholds_match_backend_buckets() {
        assert_eq!(Severity::from_score(0.95), Severity::Danger);
        assert_eq!(Severity::from_score(0.85), Severity::Danger);
        assert_eq!(Severity::from_score(0.849), Severity::Warning);
        assert_eq!(Severity::from_score(0.60), Severity::Warning);
        assert_eq!(Severity::from_score(0.59), Severity::Secondary);
        assert_eq!(Severity::from_score(0.0), Severity::Secondary);
    }

    #[test]
    fn parses_wire_names_and_bucket_names() {
        assert_eq!("danger".parse::<Severity>(), Ok(Severity::Danger));
        assert_eq!("Severe".parse::<Severity>(), Ok(Severity::Danger));
        assert_eq!(" WARNING ".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("minor".parse::<Severity>(), Ok(Severity::Secondary));
        assert!("purple".parse::<Severity>().is_err());
    }

    #[test]
    fn tally_counts_each_bucket() {
        let counts = SeverityCounts::tally([
            Severity::Danger,
            Severity::Secondary,
            Severity::Danger,
            Severity::Warning,
        ]);
        assert_eq!(
            counts,
            SeverityCounts {
                severe: 2,
                moderate: 1,
                minor: 1
            }
        );
        assert_eq!(counts.total(), 4);
    }
}
