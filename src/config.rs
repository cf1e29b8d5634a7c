use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};
use crate::metrics::registry::validate_spans;
use crate::metrics::SpanConfig;

/// Settings for the status monitor. Every field has a default, so an
/// empty file (or none at all) gives three one-minute-ish spans at `/status`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Mount point of the status page; its sub-paths serve the data.
    pub path: String,
    pub title: String,
    pub spans: Vec<SpanConfig>,
    /// Requests still running after this long are counted as 5xx.
    pub request_timeout_ms: Option<u64>,
    /// Snapshots buffered per observer before a slow one starts skipping.
    pub stream_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            path: "/status".into(),
            title: env!("CARGO_PKG_NAME").into(),
            spans: vec![
                SpanConfig::new(1, 60),
                SpanConfig::new(5, 60),
                SpanConfig::new(15, 60),
            ],
            request_timeout_ms: None,
            stream_buffer: 64,
        }
    }
}

impl MonitorConfig {
    /// Defaults, overlaid with `file` (TOML/YAML/JSON by extension; optional
    /// when not given explicitly) and then `STATUS_MONITOR__*` variables.
    pub fn load(file: Option<&str>) -> MonitorResult<Self> {
        let cfg: MonitorConfig = config::Config::builder()
            .add_source(config::File::with_name(file.unwrap_or("monitor")).required(file.is_some()))
            .add_source(config::Environment::with_prefix("STATUS_MONITOR").separator("__"))
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if !self.path.starts_with('/') {
            return Err(MonitorError::InvalidConfig(format!(
                "path '{}' must start with '/'",
                self.path
            )));
        }
        if self.path.len() > 1 && self.path.ends_with('/') {
            return Err(MonitorError::InvalidConfig(format!(
                "path '{}' must not end with '/'",
                self.path
            )));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(MonitorError::InvalidConfig(
                "request_timeout_ms must be positive".into(),
            ));
        }
        validate_spans(&self.spans)
    }
}
