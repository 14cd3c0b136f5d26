use super::types::{AuthenticationStatus, VerifierReport};
use crate::config::Config;
use crate::error::{MailSecError, Result};
use async_trait::async_trait;
use mail_auth::{Resolver, SpfResult as MailAuthSpfResult};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

/// External authentication verifier
///
/// Its output is advisory: callers must keep going when it fails.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, domain: &str) -> Result<VerifierReport>;
}

/// Verifier that runs an SPF evaluation for a synthetic sender
///
/// The probe checks `postmaster@<domain>` as if it were sent from the
/// configured probe address with the configured HELO name.
pub struct MailAuthVerifier {
    resolver: Arc<Resolver>,
    probe_ip: IpAddr,
    helo_domain: String,
}

impl MailAuthVerifier {
    /// Create a verifier using the system DNS configuration
    pub fn new(probe_ip: IpAddr, helo_domain: impl Into<String>) -> Result<Self> {
        let resolver = match Resolver::new_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!("Failed to load system DNS config ({}), using Cloudflare", e);
                Resolver::new_cloudflare_tls()
                    .map_err(|e| MailSecError::Verifier(e.to_string()))?
            }
        };

        Ok(Self {
            resolver: Arc::new(resolver),
            probe_ip,
            helo_domain: helo_domain.into(),
        })
    }

    /// Build the verifier when `analysis.enable_verifier` is set
    pub fn from_config(config: &Config) -> Result<Option<Arc<dyn AuthVerifier>>> {
        if !config.analysis.enable_verifier {
            return Ok(None);
        }

        let probe_ip: IpAddr = config.analysis.verifier_probe_ip.parse().map_err(|_| {
            MailSecError::Config(format!(
                "invalid analysis.verifier_probe_ip: {}",
                config.analysis.verifier_probe_ip
            ))
        })?;

        let verifier = Self::new(probe_ip, config.server.hostname.clone())?;
        Ok(Some(Arc::new(verifier)))
    }

    fn reason_message(result: MailAuthSpfResult) -> &'static str {
        match result {
            MailAuthSpfResult::Pass => "Probe IP is authorized to send for this domain",
            MailAuthSpfResult::Fail => "Probe IP is not authorized to send for this domain",
            MailAuthSpfResult::SoftFail => "Probe IP may not be authorized (soft fail policy)",
            MailAuthSpfResult::Neutral => {
                "Domain owner does not assert whether the probe IP is authorized"
            }
            MailAuthSpfResult::TempError => "Temporary DNS error during SPF evaluation",
            MailAuthSpfResult::PermError => "SPF record has a permanent error",
            MailAuthSpfResult::None => "Domain has no SPF record",
        }
    }
}

#[async_trait]
impl AuthVerifier for MailAuthVerifier {
    async fn verify(&self, domain: &str) -> Result<VerifierReport> {
        let sender = format!("postmaster@{}", domain);
        info!(
            "Verifier probe for {} from {} (HELO: {})",
            sender, self.probe_ip, self.helo_domain
        );

        let output = self
            .resolver
            .verify_spf_sender(self.probe_ip, &self.helo_domain, domain, &sender)
            .await;
        let result = output.result();
        debug!("Verifier SPF result: {:?}", result);

        let status = match result {
            MailAuthSpfResult::Pass => AuthenticationStatus::Pass,
            MailAuthSpfResult::Fail => AuthenticationStatus::Fail,
            MailAuthSpfResult::SoftFail => AuthenticationStatus::SoftFail,
            MailAuthSpfResult::Neutral => AuthenticationStatus::Neutral,
            MailAuthSpfResult::TempError => AuthenticationStatus::TempError,
            MailAuthSpfResult::PermError => AuthenticationStatus::PermError,
            MailAuthSpfResult::None => AuthenticationStatus::None,
        };

        Ok(VerifierReport::new(
            status,
            Some(Self::reason_message(result).to_string()),
        ))
    }
}

/// Run the verifier under a timeout; any failure becomes `None`
pub async fn advisory_report(
    verifier: Option<&Arc<dyn AuthVerifier>>,
    domain: &str,
    timeout: std::time::Duration,
) -> Option<VerifierReport> {
    let verifier = verifier?;

    match tokio::time::timeout(timeout, verifier.verify(domain)).await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(e)) => {
            warn!("Verifier failed for {}: {}", domain, e);
            None
        }
        Err(_) => {
            warn!("Verifier timed out for {} after {:?}", domain, timeout);
            None
        }
    }
}
