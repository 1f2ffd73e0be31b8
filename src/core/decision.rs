use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{DetectedDamage, DetectionResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Reject => "reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a response with only moderate or minor damage is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectPolicy {
    /// Any detected damage rejects the package.
    #[default]
    Any,
    /// Only severe damage rejects the package.
    Severe,
}

impl RejectPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            RejectPolicy::Any => "any",
            RejectPolicy::Severe => "severe",
        }
    }
}

impl fmt::Display for RejectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(RejectPolicy::Any),
            "severe" => Ok(RejectPolicy::Severe),
            other => Err(format!("unknown reject policy: {other} (expected any|severe)")),
        }
    }
}

pub fn decide(resp: &DetectionResponse, policy: RejectPolicy) -> Decision {
    if resp.total_damages == 0 {
        return Decision::Accept;
    }
    if resp.severity_counts.severe > 0 {
        return Decision::Reject;
    }
    match policy {
        RejectPolicy::Any => Decision::Reject,
        RejectPolicy::Severe => Decision::Accept,
    }
}

/// The highest-scoring detection; the first one wins a tie.
pub fn primary_damage(detections: &[DetectedDamage]) -> Option<&DetectedDamage> {
    let mut best: Option<&DetectedDamage> = None;
    for d in detections {
        match best {
            Some(b) if d.score <= b.score => {}
            _ => best = Some(d),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Severity, SeverityCounts};

    fn damage(id: u32, class_name: &str, score: f64) -> DetectedDamage {
        let severity = Severity::from_score(score);
        DetectedDamage {
            id,
            class_name: class_name.to_string(),
            severity,
            score,
            bbox: [0.0, 0.0, 10.0, 10.0],
            color: crate::core::default_color(severity).to_string(),
            dimensions: "10x10px".to_string(),
            crop_url: None,
        }
    }

    fn response(detections: Vec<DetectedDamage>) -> DetectionResponse {
        let counts = SeverityCounts::tally(detections.iter().map(|d| d.severity));
        serde_json::from_value(serde_json::json!({
            "success": true,
            "tracking_code": "PKG-TEST",
            "status": if detections.is_empty() { "passed" } else { "damaged" },
            "detections": detections,
            "total_damages": detections.len(),
            "severity_counts": counts,
            "annotated_image_url": "",
        }))
        .expect("build response")
    }

    #[test]
    fn no_damage_is_always_accepted() {
        let resp = response(vec![]);
        assert_eq!(decide(&resp, RejectPolicy::Any), Decision::Accept);
        assert_eq!(decide(&resp, RejectPolicy::Severe), Decision::Accept);
    }

    #[test]
    fn zero_total_wins_over_stale_counts() {
        let mut resp = response(vec![]);
        resp.severity_counts.severe = 2;
        assert_eq!(decide(&resp, RejectPolicy::Any), Decision::Accept);
    }

    #[test]
    fn severe_damage_is_always_rejected() {
        let resp = response(vec![damage(1, "Torn", 0.95), damage(2, "Scratch", 0.3)]);
        assert_eq!(decide(&resp, RejectPolicy::Any), Decision::Reject);
        assert_eq!(decide(&resp, RejectPolicy::Severe), Decision::Reject);
    }

    #[test]
    fn minor_only_damage_follows_policy() {
        let resp = response(vec![damage(1, "Scratch", 0.4), damage(2, "Dent", 0.7)]);
        assert_eq!(resp.severity_counts.severe, 0);
        assert_eq!(decide(&resp, RejectPolicy::Any), Decision::Reject);
        assert_eq!(decide(&resp, RejectPolicy::Severe), Decision::Accept);
    }

    #[test]
    fn primary_damage_has_max_score() {
        let detections = vec![
            damage(1, "Scratch", 0.41),
            damage(2, "Wet", 0.93),
            damage(3, "Dent", 0.62),
        ];
        let primary = primary_damage(&detections).expect("primary");
        assert_eq!(primary.id, 2);
        for d in &detections {
            assert!(primary.score >= d.score);
        }
    }

    #[test]
    fn primary_damage_tie_keeps_first() {
        let detections = vec![damage(1, "Wet", 0.8), damage(2, "Torn", 0.8)];
        assert_eq!(primary_damage(&detections).map(|d| d.id), Some(1));
    }

    #[test]
    fn primary_damage_of_empty_is_none() {
        assert!(primary_damage(&[]).is_none());
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("ANY".parse::<RejectPolicy>(), Ok(RejectPolicy::Any));
        assert_eq!(" severe".parse::<RejectPolicy>(), Ok(RejectPolicy::Severe));
        assert!("never".parse::<RejectPolicy>().is_err());
    }
}
