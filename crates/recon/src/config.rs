use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// CSV ledger path, resolved relative to the config file by the caller.
    pub file: String,
    pub columns: ColumnMapping,
    #[serde(default)]
    pub policy: MatchPolicy,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    pub customer_id: String,
    pub product_code: String,
    pub quantity: String,
    pub timestamp: String,
    pub cancelled: String,
}

// ---------------------------------------------------------------------------
// Matching policy
// ---------------------------------------------------------------------------

/// Knobs the engine reads during a pass. Defaults mirror the upstream retail
/// feed: "00000" marks rows with no customer, "D" is the discount adjustment
/// code.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchPolicy {
    /// Reserved customer id meaning "unknown customer". Such rows are never
    /// cancellation targets and are never reconciled as cancellations.
    #[serde(default = "default_unknown_customer")]
    pub unknown_customer: String,
    /// Product codes exempt from the canceled ≤ bought scan (adjustment
    /// rows, not physical stock).
    #[serde(default = "default_exempt_codes")]
    pub exempt_codes: Vec<String>,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// Cap on how many cancellation records to process. Unprocessed
    /// cancellations are skipped, not classified.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            unknown_customer: default_unknown_customer(),
            exempt_codes: default_exempt_codes(),
            timestamp_format: default_timestamp_format(),
            limit: None,
        }
    }
}

fn default_unknown_customer() -> String {
    "00000".into()
}

fn default_exempt_codes() -> Vec<String> {
    vec!["D".into()]
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".into()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// JSON result path.
    #[serde(default)]
    pub json: Option<String>,
    /// Annotated-ledger CSV path.
    #[serde(default)]
    pub annotated: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }
        if self.file.trim().is_empty() {
            return Err(ReconError::ConfigValidation("file must not be empty".into()));
        }
        if self.policy.unknown_customer.is_empty() {
            return Err(ReconError::ConfigValidation(
                "policy.unknown_customer must not be empty".into(),
            ));
        }
        if self.policy.timestamp_format.is_empty() {
            return Err(ReconError::ConfigValidation(
                "policy.timestamp_format must not be empty".into(),
            ));
        }
        Ok(())
    }
}
