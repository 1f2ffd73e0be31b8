use serde::{Deserialize, Serialize};

use crate::core::{Severity, SeverityCounts};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDetectedDamage")]
pub struct DetectedDamage {
    pub id: u32,
    pub class_name: String,
    pub severity: Severity,
    pub score: f64,
    pub bbox: [f64; 4],
    pub color: String,
    pub dimensions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_url: Option<String>,
}

impl DetectedDamage {
    pub fn width(&self) -> f64 {
        (self.bbox[2] - self.bbox[0]).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.bbox[3] - self.bbox[1]).max(0.0)
    }
}

// Older API builds send `type`/`confidence` and numeric ids as strings.
#[derive(Debug, Deserialize)]
struct RawDetectedDamage {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, alias = "type")]
    class_name: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default, alias = "confidence")]
    score: f64,
    #[serde(default)]
    bbox: Vec<f64>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    dimensions: Option<String>,
    #[serde(default)]
    crop_url: Option<String>,
}

impl From<RawDetectedDamage> for DetectedDamage {
    fn from(raw: RawDetectedDamage) -> Self {
        let score = if raw.score.is_finite() {
            raw.score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let severity = raw
            .severity
            .as_deref()
            .and_then(|s| s.parse::<Severity>().ok())
            .unwrap_or_else(|| Severity::from_score(score));

        let mut bbox = [0.0; 4];
        for (slot, v) in bbox.iter_mut().zip(raw.bbox.iter()) {
            *slot = *v;
        }

        let id = match raw.id {
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };

        let dimensions = raw.dimensions.unwrap_or_else(|| {
            format!(
                "{}x{}px",
                (bbox[2] - bbox[0]).max(0.0).round() as i64,
                (bbox[3] - bbox[1]).max(0.0).round() as i64
            )
        });

        Self {
            id,
            class_name: raw.class_name,
            severity,
            score,
            bbox,
            color: raw.color.unwrap_or_else(|| default_color(severity).to_string()),
            dimensions,
            crop_url: raw.crop_url,
        }
    }
}

pub fn default_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Danger => "#ff4d6d",
        Severity::Warning => "#ffa500",
        Severity::Secondary => "#00ff88",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDetectionResponse")]
pub struct DetectionResponse {
    pub success: bool,
    pub tracking_code: String,
    pub status: String,
    pub detections: Vec<DetectedDamage>,
    pub total_damages: u32,
    pub severity_counts: SeverityCounts,
    pub annotated_image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradcam_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shap_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_s3_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_s3_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradcam_s3_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shap_s3_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDetectionResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    tracking_code: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    detections: Option<Vec<DetectedDamage>>,
    #[serde(default)]
    total_damages: Option<u32>,
    #[serde(default)]
    severity_counts: Option<SeverityCounts>,
    #[serde(default, alias = "annotated_image")]
    annotated_image_url: Option<String>,
    #[serde(default, alias = "gradcam_image")]
    gradcam_url: Option<String>,
    #[serde(default, alias = "shap_image")]
    shap_url: Option<String>,
    #[serde(default)]
    package_id: Option<i64>,
    #[serde(default)]
    original_s3_url: Option<String>,
    #[serde(default)]
    annotated_s3_url: Option<String>,
    #[serde(default)]
    gradcam_s3_url: Option<String>,
    #[serde(default)]
    shap_s3_url: Option<String>,
    #[serde(default)]
    image_width: Option<u32>,
    #[serde(default)]
    image_height: Option<u32>,
    #[serde(default)]
    inference_time_ms: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    inspector: Option<String>,
}

impl From<RawDetectionResponse> for DetectionResponse {
    fn from(raw: RawDetectionResponse) -> Self {
        let detections = raw.detections.unwrap_or_default();
        let severity_counts = raw
            .severity_counts
            .unwrap_or_else(|| SeverityCounts::tally(detections.iter().map(|d| d.severity)));
        let total_damages = raw
            .total_damages
            .unwrap_or(detections.len() as u32);

        Self {
            success: raw.success.unwrap_or(false),
            tracking_code: raw.tracking_code.unwrap_or_default(),
            status: raw.status.unwrap_or_else(|| "unknown".to_string()),
            detections,
            total_damages,
            severity_counts,
            annotated_image_url: raw.annotated_image_url.unwrap_or_default(),
            gradcam_url: raw.gradcam_url.filter(|s| !s.is_empty()),
            shap_url: raw.shap_url.filter(|s| !s.is_empty()),
            package_id: raw.package_id,
            original_s3_url: raw.original_s3_url,
            annotated_s3_url: raw.annotated_s3_url,
            gradcam_s3_url: raw.gradcam_s3_url,
            shap_s3_url: raw.shap_s3_url,
            image_width: raw.image_width,
            image_height: raw.image_height,
            inference_time_ms: raw.inference_time_ms,
            timestamp: raw.timestamp,
            inspector: raw.inspector,
        }
    }
}

impl DetectionResponse {
    pub fn has_detections(&self) -> bool {
        self.success && self.total_damages > 0
    }

    /// Distinct class names in order of first appearance.
    pub fn damage_classes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for d in &self.detections {
            let name = d.class_name.as_str();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_payload() {
        let json = r##"{
            "success": true,
            "package_id": 42,
            "tracking_code": "PKG-20251116-ABCD1234",
            "status": "damaged",
            "detections": [
                {"id": 1, "class_name": "Torn", "score": 0.91, "bbox": [10, 20, 110, 70],
                 "severity": "danger", "color": "#ff4d6d", "dimensions": "100x50px", "crop_url": null}
            ],
            "total_damages": 1,
            "severity_counts": {"severe": 1, "moderate": 0, "minor": 0},
            "annotated_image_url": "data:image/jpeg;base64,AAAA",
            "gradcam_url": null,
            "shap_url": "data:image/jpeg;base64,BBBB",
            "image_width": 640,
            "image_height": 480,
            "inference_time_ms": 812,
            "timestamp": "2025-11-16T14:37:47",
            "inspector": "admin"
        }"##;
        let resp: DetectionResponse = serde_json::from_str(json).expect("decode");
        assert!(resp.success);
        assert_eq!(resp.package_id, Some(42));
        assert_eq!(resp.detections.len(), 1);
        let d = &resp.detections[0];
        assert_eq!(d.id, 1);
        assert_eq!(d.severity, Severity::Danger);
        assert_eq!(d.bbox, [10.0, 20.0, 110.0, 70.0]);
        assert_eq!(d.width(), 100.0);
        assert_eq!(d.height(), 50.0);
        assert_eq!(resp.gradcam_url, None);
        assert_eq!(resp.shap_url.as_deref(), Some("data:image/jpeg;base64,BBBB"));
        assert!(resp.has_detections());
    }

    #[test]
    fn missing_severity_falls_back_to_score_bucket() {
        let json = r#"{"id": "3", "type": "Dent", "confidence": 0.7, "bbox": [0, 0, 20, 10]}"#;
        let d: DetectedDamage = serde_json::from_str(json).expect("decode");
        assert_eq!(d.id, 3);
        assert_eq!(d.class_name, "Dent");
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.color, "#ffa500");
        assert_eq!(d.dimensions, "20x10px");
    }

    #[test]
    fn missing_counts_are_tallied_from_detections() {
        let json = r#"{
            "success": true,
            "detections": [
                {"class_name": "Wet", "score": 0.9, "severity": "danger", "bbox": [0,0,1,1]},
                {"class_name": "Scratch", "score": 0.3, "bbox": [0,0,1,1]}
            ]
        }"#;
        let resp: DetectionResponse = serde_json::from_str(json).expect("decode");
        assert_eq!(resp.total_damages, 2);
        assert_eq!(resp.severity_counts.severe, 1);
        assert_eq!(resp.severity_counts.minor, 1);
        assert_eq!(resp.status, "unknown");
    }

    #[test]
    fn null_detections_decode_as_empty() {
        let json = r#"{"success": true, "tracking_code": "PKG-1", "detections": null, "total_damages": null}"#;
        let resp: DetectionResponse = serde_json::from_str(json).expect("decode");
        assert!(resp.detections.is_empty());
        assert_eq!(resp.total_damages, 0);
        assert!(!resp.has_detections());
    }

    #[test]
    fn out_of_range_ids_do_not_wrap() {
        let json = r#"{"id": 4294967297, "class_name": "Dent", "score": 0.7}"#;
        let d: DetectedDamage = serde_json::from_str(json).expect("decode");
        assert_eq!(d.id, 0);

        let json = r#"{"id": 4294967295, "class_name": "Dent", "score": 0.7}"#;
        let d: DetectedDamage = serde_json::from_str(json).expect("decode");
        assert_eq!(d.id, u32::MAX);
    }

    #[test]
    fn damage_classes_are_distinct_in_first_seen_order() {
        let json = r#"{
            "success": true,
            "detections": [
                {"class_name": "Wet", "score": 0.9},
                {"class_name": "Torn", "score": 0.5},
                {"class_name": "Wet", "score": 0.4}
            ]
        }"#;
        let resp: DetectionResponse = serde_json::from_str(json).expect("decode");
        assert_eq!(resp.damage_classes(), vec!["Wet", "Torn"]);
    }
}
