use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sheet: SheetLayout,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Where the interesting columns live in the export (0-based), plus the
/// feed constants applied while building series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetLayout {
    #[serde(default = "default_timestamp_col")]
    pub timestamp_col: usize,
    #[serde(default = "default_port_col")]
    pub port_col: usize,
    #[serde(default = "default_payload_col")]
    pub payload_col: usize,
    /// Port assigned to rows whose port cell is blank.
    #[serde(default = "default_port")]
    pub default_port: i64,
    /// The feed reports no battery telemetry; exports carry this constant.
    #[serde(default = "default_battery_level")]
    pub battery_level: f64,
}

fn default_timestamp_col() -> usize {
    2
}
fn default_port_col() -> usize {
    5
}
fn default_payload_col() -> usize {
    6
}
fn default_port() -> i64 {
    1
}
fn default_battery_level() -> f64 {
    3.65
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            timestamp_col: default_timestamp_col(),
            port_col: default_port_col(),
            payload_col: default_payload_col(),
            default_port: default_port(),
            battery_level: default_battery_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Default output file for `convert`.
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_output() -> String {
    "data.csv".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file with environment variable
    /// substitution in the format $(VAR_NAME).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let layout = &self.sheet;
        if layout.timestamp_col == layout.payload_col
            || layout.timestamp_col == layout.port_col
            || layout.port_col == layout.payload_col
        {
            return Err(AppError::Config(
                "Sheet columns must be pairwise distinct".to_string(),
            ));
        }
        if self.export.output.is_empty() {
            return Err(AppError::Config(
                "Export output file name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in the format $(VAR_NAME)
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    let re = regex::Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)").unwrap();

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    result
}
