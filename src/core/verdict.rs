use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{
    DetectedDamage, DetectionResponse, Decision, OperatorExplanation, RejectPolicy,
    SeverityCounts, decide, explain, primary_damage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageView {
    Original,
    Annotated,
    Gradcam,
    Shap,
}

impl ImageView {
    pub const fn as_str(self) -> &'static str {
        match self {
            ImageView::Original => "original",
            ImageView::Annotated => "annotated",
            ImageView::Gradcam => "gradcam",
            ImageView::Shap => "shap",
        }
    }
}

impl fmt::Display for ImageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(ImageView::Original),
            "annotated" | "detection" => Ok(ImageView::Annotated),
            "gradcam" => Ok(ImageView::Gradcam),
            "shap" => Ok(ImageView::Shap),
            other => Err(format!(
                "unknown view: {other} (expected original|annotated|gradcam|shap)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassExplanation {
    pub class_name: String,
    pub count: u32,
    pub explanation: OperatorExplanation,
}

/// Everything a presentation layer needs from one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub tracking_code: String,
    pub status: String,
    pub decision: Decision,
    pub policy: RejectPolicy,
    pub has_detections: bool,
    pub total_damages: u32,
    pub severity_counts: SeverityCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_damage: Option<DetectedDamage>,
    pub explanations: Vec<ClassExplanation>,
    pub available_views: Vec<ImageView>,
    pub default_view: ImageView,
}

impl Verdict {
    pub fn from_response(resp: &DetectionResponse, policy: RejectPolicy) -> Self {
        let explanations = resp
            .damage_classes()
            .into_iter()
            .map(|class_name| ClassExplanation {
                class_name: class_name.to_string(),
                count: resp
                    .detections
                    .iter()
                    .filter(|d| d.class_name == class_name)
                    .count() as u32,
                explanation: explain(class_name),
            })
            .collect();

        let has_detections = resp.has_detections();
        Self {
            tracking_code: resp.tracking_code.clone(),
            status: resp.status.clone(),
            decision: decide(resp, policy),
            policy,
            has_detections,
            total_damages: resp.total_damages,
            severity_counts: resp.severity_counts,
            primary_damage: primary_damage(&resp.detections).cloned(),
            explanations,
            available_views: available_views(resp),
            default_view: if has_detections {
                ImageView::Annotated
            } else {
                ImageView::Original
            },
        }
    }

    pub fn primary_explanation(&self) -> Option<&ClassExplanation> {
        let primary = self.primary_damage.as_ref()?;
        self.explanations
            .iter()
            .find(|e| e.class_name == primary.class_name)
    }
}

pub fn available_views(resp: &DetectionResponse) -> Vec<ImageView> {
    let mut views = vec![ImageView::Original];
    if !resp.annotated_image_url.is_empty() {
        views.push(ImageView::Annotated);
    }
    if resp.gradcam_url.is_some() {
        views.push(ImageView::Gradcam);
    }
    if resp.shap_url.is_some() {
        views.push(ImageView::Shap);
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> DetectionResponse {
        serde_json::from_value(json).expect("decode response")
    }

    #[test]
    fn clean_package_verdict() {
        let resp = parse(serde_json::json!({
            "success": true,
            "tracking_code": "PKG-1",
            "status": "passed",
            "detections": [],
            "total_damages": 0,
            "severity_counts": {"severe": 0, "moderate": 0, "minor": 0},
            "annotated_image_url": "data:image/jpeg;base64,AA"
        }));
        let v = Verdict::from_response(&resp, RejectPolicy::Any);
        assert_eq!(v.decision, Decision::Accept);
        assert!(!v.has_detections);
        assert!(v.primary_damage.is_none());
        assert!(v.explanations.is_empty());
        assert_eq!(v.default_view, ImageView::Original);
        assert_eq!(v.available_views, vec![ImageView::Original, ImageView::Annotated]);
    }

    #[test]
    fn damaged_package_verdict() {
        let resp = parse(serde_json::json!({
            "success": true,
            "tracking_code": "PKG-2",
            "status": "damaged",
            "detections": [
                {"id": 1, "class_name": "Wet", "score": 0.66, "severity": "warning", "bbox": [0,0,5,5]},
                {"id": 2, "class_name": "Torn", "score": 0.92, "severity": "danger", "bbox": [0,0,5,5]},
                {"id": 3, "class_name": "wet", "score": 0.31, "severity": "secondary", "bbox": [0,0,5,5]}
            ],
            "total_damages": 3,
            "severity_counts": {"severe": 1, "moderate": 1, "minor": 1},
            "annotated_image_url": "data:image/jpeg;base64,AA",
            "gradcam_url": "data:image/jpeg;base64,BB",
            "shap_url": "data:image/jpeg;base64,CC"
        }));
        let v = Verdict::from_response(&resp, RejectPolicy::Severe);
        assert_eq!(v.decision, Decision::Reject);
        assert_eq!(v.primary_damage.as_ref().map(|d| d.id), Some(2));
        assert_eq!(
            v.primary_explanation().map(|e| e.class_name.as_str()),
            Some("Torn")
        );
        let classes: Vec<&str> = v.explanations.iter().map(|e| e.class_name.as_str()).collect();
        assert_eq!(classes, vec!["Wet", "Torn", "wet"]);
        assert_eq!(v.explanations[0].explanation, v.explanations[2].explanation);
        assert_eq!(v.default_view, ImageView::Annotated);
        assert_eq!(v.available_views.len(), 4);
    }
}
