use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{
    DetectedDamage, DetectionResponse, Decision, OperatorExplanation, Severity, Verdict,
};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    if is_auth_failure(err) {
        let _ = writeln!(
            stderr,
            "  - log in again and update `api.token` (or PARCELSCAN_API_TOKEN)"
        );
    }
    let _ = writeln!(stderr, "  - re-run with `--verbose` for request details");
    let _ = writeln!(stderr, "  - see `parcelscan --help` for commands and options");
}

fn is_auth_failure(err: &Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<crate::client::DetectError>()
            .is_some_and(crate::client::DetectError::requires_reauth)
    })
}

pub fn print_verdict(verdict: &Verdict, resp: &DetectionResponse, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "Package {}: {}",
        display_code(&verdict.tracking_code),
        format_decision(verdict.decision, cfg.color)
    );
    let _ = writeln!(
        out,
        "Damages: {}  (severe {} / moderate {} / minor {})  policy={}",
        verdict.total_damages,
        verdict.severity_counts.severe,
        verdict.severity_counts.moderate,
        verdict.severity_counts.minor,
        verdict.policy
    );
    if cfg.verbose {
        let _ = writeln!(out, "Server status: {}", verdict.status);
        if let Some(ms) = resp.inference_time_ms {
            let _ = writeln!(out, "Inference time: {ms} ms");
        }
        if let Some(inspector) = &resp.inspector {
            let _ = writeln!(out, "Inspector: {inspector}");
        }
    }

    if !verdict.has_detections {
        let _ = writeln!(out, "No damage detected. The package can be delivered.");
        return;
    }

    if let Some(primary) = &verdict.primary_damage {
        let _ = writeln!(
            out,
            "Primary damage: {} [{}] {:.1}%",
            primary.class_name,
            format_severity(primary.severity, cfg.color),
            primary.score * 100.0
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Detections:");
    print_detections_table(&mut out, &resp.detections, cfg.color);

    let _ = writeln!(out);
    let _ = writeln!(out, "Operator guidance:");
    for item in &verdict.explanations {
        let _ = writeln!(out, "- {} (x{})", item.class_name, item.count);
        write_explanation(&mut out, &item.explanation, "    ");
    }

    let views: Vec<&str> = verdict.available_views.iter().map(|v| v.as_str()).collect();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Views: {} (default: {})",
        views.join(", "),
        verdict.default_view
    );
}

pub fn print_explanation(class_name: &str, explanation: &OperatorExplanation, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{class_name}");
    write_explanation(&mut out, explanation, "  ");
}

fn write_explanation(out: &mut dyn Write, e: &OperatorExplanation, indent: &str) {
    let _ = writeln!(out, "{indent}What: {}", e.what);
    let _ = writeln!(out, "{indent}Why: {}", e.why);
    let _ = writeln!(out, "{indent}Cause: {}", e.cause);
    let _ = writeln!(out, "{indent}Recommendation: {}", e.recommendation);
}

pub fn print_value(title: &str, value: &serde_json::Value, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{title}");
    match value {
        serde_json::Value::Object(map) => {
            let key_w = map.keys().map(|k| visible_width_ansi(k)).max().unwrap_or(0);
            for (k, v) in map {
                let v = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let _ = writeln!(out, "  {}  {}", pad_end_display(k, key_w), v);
            }
        }
        other => {
            let _ = writeln!(out, "  {other}");
        }
    }
}

fn print_detections_table(out: &mut dyn Write, detections: &[DetectedDamage], color: bool) {
    let label_id = "#";
    let label_class = "Class";
    let label_sev = "Severity";
    let label_conf = "Conf";
    let label_dim = "Size";

    let id_w = detections
        .iter()
        .map(|d| d.id.to_string().len())
        .max()
        .unwrap_or(0)
        .max(label_id.len());
    let class_w = detections
        .iter()
        .map(|d| visible_width_ansi(&d.class_name))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_class));
    let sev_w = visible_width_ansi(label_sev).max("secondary".len());
    let conf_w = visible_width_ansi(label_conf).max(6);

    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}",
        pad_start_display(label_id, id_w),
        pad_end_display(label_class, class_w),
        pad_end_display(label_sev, sev_w),
        pad_start_display(label_conf, conf_w),
        label_dim
    );
    for d in detections {
        let sev = format_severity(d.severity, color);
        let conf = format!("{:.1}%", d.score * 100.0);
        let _ = writeln!(
            out,
            "{}  {}  {}  {}  {}",
            pad_start_display(&d.id.to_string(), id_w),
            pad_end_display(&d.class_name, class_w),
            pad_end_display(&sev, sev_w),
            pad_start_display(&conf, conf_w),
            d.dimensions
        );
    }
}

fn display_code(code: &str) -> &str {
    if code.is_empty() { "(no tracking code)" } else { code }
}

fn format_decision(decision: Decision, color: bool) -> String {
    let s = match decision {
        Decision::Accept => "ACCEPT",
        Decision::Reject => "REJECT",
    };
    if !color {
        return s.to_string();
    }
    let code = match decision {
        Decision::Accept => "32",
        Decision::Reject => "31",
    };
    format!("\x1b[1;{code}m{s}\x1b[0m")
}

fn format_severity(severity: Severity, color: bool) -> String {
    let s = severity.as_str();
    if !color {
        return s.to_string();
    }

    let code = match severity {
        Severity::Secondary => "90",
        Severity::Warning => "33",
        Severity::Danger => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
