use crate::error::{MailSecError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub dns: DnsConfig,
    pub analysis: AnalysisConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Name presented as HELO identity by the verifier probe
    pub hostname: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DnsConfig {
    pub timeout_secs: u64,
    pub attempts: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub default_dkim_selector: String,
    pub enable_verifier: bool,
    pub verifier_probe_ip: String,
    pub verifier_timeout_secs: u64,
    pub weights: CompositeWeights,
}

/// Relative weight of each protocol in the overall score
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub dmarc: f64,
    pub spf: f64,
    pub dkim: f64,
    pub mx: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub eviction_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MailSecError::Config(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| MailSecError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let w = &self.analysis.weights;
        if [w.dmarc, w.spf, w.dkim, w.mx].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(MailSecError::Config(
                "analysis.weights must be finite and non-negative".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(MailSecError::Config(
                "rate_limit.window_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl DnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AnalysisConfig {
    pub fn verifier_timeout(&self) -> Duration {
        Duration::from_secs(self.verifier_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            hostname: "localhost".to_string(),
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            attempts: 2,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_dkim_selector: "default".to_string(),
            enable_verifier: false,
            verifier_probe_ip: "127.0.0.1".to_string(),
            verifier_timeout_secs: 5,
            weights: CompositeWeights::default(),
        }
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            dmarc: 1.0,
            spf: 1.0,
            dkim: 1.0,
            mx: 1.0,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
            eviction_interval_secs: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
