//! Process-level orchestration settings
//!
//! Knobs that apply to every submission in this process, as opposed to the
//! per-submission `JobConfig`.

/// Orchestration settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Prefer the cluster's own REST endpoint over the gateway for
    /// out-of-band control (cancel, savepoint).
    pub prefer_rest_control: bool,

    /// Row cap applied to query results when the submission does not set one.
    pub default_max_rows: usize,
}

impl Settings {
    /// Creates settings from environment variables
    ///
    /// Expected environment variables:
    /// - SLUICE_PREFER_REST_CONTROL (optional, "true"/"false", default: true)
    /// - SLUICE_DEFAULT_MAX_ROWS (optional, default: 100)
    pub fn from_env() -> anyhow::Result<Self> {
        let prefer_rest_control = std::env::var("SLUICE_PREFER_REST_CONTROL")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(true);

        let default_max_rows = std::env::var("SLUICE_DEFAULT_MAX_ROWS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(100);

        let settings = Self {
            prefer_rest_control,
            default_max_rows,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_max_rows == 0 {
            anyhow::bail!("default_max_rows must be greater than 0");
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefer_rest_control: true,
            default_max_rows: 100,
        }
    }
}
