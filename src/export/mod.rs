use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{DetectionResponse, Verdict};

#[derive(Debug, Serialize)]
pub struct InspectionReport<'a> {
    pub schema_version: &'static str,
    pub tool_version: &'static str,
    pub generated_at: String,
    pub verdict: &'a Verdict,
    pub response: &'a DetectionResponse,
}

impl<'a> InspectionReport<'a> {
    pub fn new(response: &'a DetectionResponse, verdict: &'a Verdict) -> Self {
        Self {
            schema_version: "1.0",
            tool_version: env!("CARGO_PKG_VERSION"),
            generated_at: now_rfc3339(),
            verdict,
            response,
        }
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

fn unix_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

pub fn default_report_path(dir: &Path) -> PathBuf {
    dir.join(format!("inspection-report-{}.json", unix_millis()))
}

pub fn default_csv_path(dir: &Path) -> PathBuf {
    dir.join(format!("damage-data-{}.csv", unix_millis()))
}

pub fn write_report(path: &Path, report: &InspectionReport<'_>) -> Result<()> {
    ensure_parent(path)?;
    let buf = serde_json::to_vec_pretty(report).context("failed to serialize inspection report")?;
    std::fs::write(path, buf)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    log::info!("wrote report {}", path.display());
    Ok(())
}

pub fn detections_csv(resp: &DetectionResponse) -> String {
    let mut csv = String::from("Type,Severity,Confidence,Dimensions\n");
    for d in &resp.detections {
        csv.push_str(&csv_field(&d.class_name));
        csv.push(',');
        csv.push_str(d.severity.as_str());
        csv.push(',');
        csv.push_str(&format!("{:.4}", d.score));
        csv.push(',');
        csv.push_str(&csv_field(&d.dimensions));
        csv.push('\n');
    }
    csv
}

pub fn write_csv(path: &Path, resp: &DetectionResponse) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, detections_csv(resp))
        .with_context(|| format!("failed to write CSV: {}", path.display()))?;
    log::info!("wrote CSV {}", path.display());
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
