//! DNS lookups consumed by the analyzers
//!
//! The analyzers only see the [`TxtResolver`] and [`MxResolver`] traits.
//! [`DnsResolver`] is the production implementation on top of
//! `trust-dns-resolver`; tests substitute their own.
//!
//! Timeouts are enforced here through the resolver options, never inside
//! scoring code.

use crate::config::DnsConfig;
use crate::error::{MailSecError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::TokioAsyncResolver;

#[cfg(test)]
use mockall::automock;

/// One MX answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxRecord {
    pub exchange: String,
    pub priority: u16,
}

/// TXT lookup contract
///
/// Each answer is returned as its list of character-string segments, in wire order.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TxtResolver: Send + Sync {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<Vec<String>>>;
}

/// MX lookup contract
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MxResolver: Send + Sync {
    async fn resolve_mx(&self, name: &str) -> Result<Vec<MxRecord>>;
}

/// Join the segments of each TXT answer and return the first one matching `accept`
pub fn select_txt_record<F>(answers: &[Vec<String>], accept: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    answers
        .iter()
        .map(|segments| segments.concat())
        .find(|record| accept(record))
}

/// System resolver backed by trust-dns
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// Create a resolver with the given timeout and attempt settings
    pub fn new(config: &DnsConfig) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout();
        opts.attempts = config.attempts;

        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);

        Self { resolver }
    }

    fn map_error(name: &str, err: ResolveError) -> MailSecError {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => {
                debug!("No records found for {}", name);
                MailSecError::NotFound(format!("No records found for {}", name))
            }
            _ => {
                warn!("DNS lookup for {} failed: {}", name, err);
                MailSecError::DnsLookup(err.to_string())
            }
        }
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new(&DnsConfig::default())
    }
}

#[async_trait]
impl TxtResolver for DnsResolver {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<Vec<String>>> {
        debug!("TXT lookup: {}", name);

        let lookup = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|e| Self::map_error(name, e))?;

        let answers: Vec<Vec<String>> = lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|segment| String::from_utf8_lossy(segment).into_owned())
                    .collect()
            })
            .collect();

        debug!("{} TXT answer(s) for {}", answers.len(), name);
        Ok(answers)
    }
}

#[async_trait]
impl MxResolver for DnsResolver {
    async fn resolve_mx(&self, name: &str) -> Result<Vec<MxRecord>> {
        debug!("MX lookup: {}", name);

        let lookup = self
            .resolver
            .mx_lookup(name)
            .await
            .map_err(|e| Self::map_error(name, e))?;

        let records: Vec<MxRecord> = lookup
            .iter()
            .map(|mx| MxRecord {
                exchange: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                priority: mx.preference(),
            })
            .collect();

        debug!("{} MX answer(s) for {}", records.len(), name);
        Ok(records)
    }
}
