//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mailsec_rs::analysis::CompositeAnalyzer;
use mailsec_rs::config::AnalysisConfig;
use mailsec_rs::error::{MailSecError, Result};
use mailsec_rs::utils::{MxRecord, MxResolver, TxtResolver};
use std::collections::HashMap;
use std::sync::Arc;

pub const DKIM_KEY: &str = "MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDwIRP/UC3SBsEmGqZ9ZJW3/DkM";

/// In-memory DNS zone
#[derive(Default)]
pub struct StaticResolver {
    txt: HashMap<String, Vec<Vec<String>>>,
    mx: HashMap<String, Vec<MxRecord>>,
    /// Names whose lookup fails with a resolution error
    failing: Vec<String>,
    /// Names whose lookup panics
    panicking: Vec<String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn txt(mut self, name: &str, record: &str) -> Self {
        self.txt
            .entry(name.to_string())
            .or_default()
            .push(vec![record.to_string()]);
        self
    }

    pub fn mx(mut self, name: &str, exchange: &str, priority: u16) -> Self {
        self.mx.entry(name.to_string()).or_default().push(MxRecord {
            exchange: exchange.to_string(),
            priority,
        });
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn panicking(mut self, name: &str) -> Self {
        self.panicking.push(name.to_string());
        self
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.panicking.iter().any(|n| n == name) {
            panic!("resolver crashed on {}", name);
        }
        if self.failing.iter().any(|n| n == name) {
            return Err(MailSecError::DnsLookup(format!("SERVFAIL for {}", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl TxtResolver for StaticResolver {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<Vec<String>>> {
        self.check(name)?;
        self.txt
            .get(name)
            .cloned()
            .ok_or_else(|| MailSecError::NotFound(format!("No records found for {}", name)))
    }
}

#[async_trait]
impl MxResolver for StaticResolver {
    async fn resolve_mx(&self, name: &str) -> Result<Vec<MxRecord>> {
        self.check(name)?;
        self.mx
            .get(name)
            .cloned()
            .ok_or_else(|| MailSecError::NotFound(format!("No records found for {}", name)))
    }
}

/// A domain with every record in good shape
pub fn healthy_zone() -> StaticResolver {
    StaticResolver::new()
        .txt(
            "_dmarc.example.com",
            "v=DMARC1; p=reject; rua=mailto:a@b.com; ruf=mailto:c@d.com; sp=reject; pct=100; adkim=s; aspf=s",
        )
        .txt("example.com", "google-site-verification=abc123")
        .txt("example.com", "v=spf1 include:_spf.google.com ~all")
        .txt(
            "default._domainkey.example.com",
            &format!("v=DKIM1; k=rsa; h=sha256; p={}", DKIM_KEY),
        )
        .mx("example.com", "alt1.mx.example.com", 20)
        .mx("example.com", "mx.example.com", 10)
}

pub fn analyzer(zone: StaticResolver) -> CompositeAnalyzer {
    let zone = Arc::new(zone);
    CompositeAnalyzer::from_config(&AnalysisConfig::default(), zone.clone(), zone, None)
}
