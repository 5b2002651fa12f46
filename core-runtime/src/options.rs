//! # Engine Options
//!
//! Typed view of the JSON configuration a host passes to `NewService`,
//! `CheckConfig` and `FormatConfig`.
//!
//! Only the top level is modelled here. Each section is kept as raw JSON and
//! handed to the engine, which owns its schema; unknown top-level keys are
//! rejected so that typos surface as validation errors instead of silently
//! ignored sections.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbounds: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbounds: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

impl EngineOptions {
    /// Inbound `type` values, in declaration order.
    pub fn inbound_types(&self) -> Vec<&str> {
        self.inbounds
            .iter()
            .filter_map(|inbound| inbound.get("type").and_then(Value::as_str))
            .collect()
    }

    /// Whether any route rule matches on Wi-Fi SSID or BSSID, which means
    /// the host has to supply Wi-Fi state.
    pub fn references_wifi_state(&self) -> bool {
        let Some(rules) = self
            .route
            .as_ref()
            .and_then(|route| route.get("rules"))
            .and_then(Value::as_array)
        else {
            return false;
        };

        rules.iter().any(rule_references_wifi)
    }
}

fn rule_references_wifi(rule: &Value) -> bool {
    if rule.get("wifi_ssid").is_some() || rule.get("wifi_bssid").is_some() {
        return true;
    }
    // Logical rules nest their members under "rules".
    rule.get("rules")
        .and_then(Value::as_array)
        .is_some_and(|nested| nested.iter().any(rule_references_wifi))
}

/// Parses configuration text.
pub fn parse_options(content: &str) -> Result<EngineOptions> {
    serde_json::from_str(content).map_err(|e| Error::Validation(format!("parse config: {}", e)))
}

/// Parses configuration text and renders it back with a two-space indent.
pub fn format_options(content: &str) -> Result<String> {
    let options = parse_options(content)?;
    serde_json::to_string_pretty(&options)
        .map_err(|e| Error::Validation(format!("encode config: {}", e)))
}
