use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::RejectPolicy;

/// Longest detection wait accepted from any config layer.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub api: ApiConfig,
    pub decision: DecisionConfig,
    pub ui: UiConfig,
    pub export: ExportConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(serialize_with = "mask_token")]
    pub token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionConfig {
    pub reject_on: RejectPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportConfig {
    pub dir: String,
}

fn mask_token<S>(token: &Option<String>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match token {
        Some(t) if !t.is_empty() => s.serialize_str("********"),
        _ => s.serialize_none(),
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: crate::client::DEFAULT_BASE_URL.to_string(),
                token: None,
                timeout_secs: 60,
            },
            decision: DecisionConfig {
                reject_on: RejectPolicy::Any,
            },
            ui: UiConfig { color: true },
            export: ExportConfig {
                dir: ".".to_string(),
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    api: Option<RawApiConfig>,
    decision: Option<RawDecisionConfig>,
    ui: Option<RawUiConfig>,
    export: Option<RawExportConfig>,
}

#[derive(Debug, Deserialize)]
struct RawApiConfig {
    base_url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawDecisionConfig {
    reject_on: Option<RejectPolicy>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawExportConfig {
    dir: Option<String>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/parcelscan/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s).context("failed to parse config file (TOML)")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        return Err(anyhow::anyhow!(
            "config file not found: {}",
            path.display()
        ));
    }

    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(api) = raw.api {
        if let Some(base_url) = api.base_url {
            cfg.api.base_url = base_url;
        }
        if let Some(token) = api.token {
            cfg.api.token = Some(token);
        }
        if let Some(timeout_secs) = api.timeout_secs {
            cfg.api.timeout_secs = timeout_secs;
        }
    }

    if let Some(decision) = raw.decision {
        if let Some(reject_on) = decision.reject_on {
            cfg.decision.reject_on = reject_on;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
    }

    if let Some(export) = raw.export {
        if let Some(dir) = export.dir {
            cfg.export.dir = dir;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("PARCELSCAN_API_BASE_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.api.base_url = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("PARCELSCAN_API_TOKEN") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.api.token = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("PARCELSCAN_API_TIMEOUT_SECS") {
        cfg.api.timeout_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "PARCELSCAN_API_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("PARCELSCAN_DECISION_REJECT_ON") {
        cfg.decision.reject_on = v
            .parse::<RejectPolicy>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "PARCELSCAN_DECISION_REJECT_ON")?;
    }
    if let Ok(v) = std::env::var("PARCELSCAN_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "PARCELSCAN_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("PARCELSCAN_EXPORT_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.export.dir = v.to_string();
        }
    }

    Ok(())
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    let url = cfg.api.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(anyhow::anyhow!(
            "api.base_url must start with http:// or https://: {url}"
        ));
    }
    check_timeout_secs(cfg.api.timeout_secs).context("api.timeout_secs")?;
    Ok(())
}

pub fn check_timeout_secs(secs: u64) -> Result<()> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(anyhow::anyhow!(
            "timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds (got {secs})"
        ));
    }
    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
