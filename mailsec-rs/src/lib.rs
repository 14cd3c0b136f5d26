//! mailsec-rs: email authentication posture analyzer
//!
//! Fetches a domain's DMARC, SPF, DKIM and MX records, explains them and
//! scores each one, then folds the four scores into an overall rating.
//!
//! # Example
//!
//! ```no_run
//! use mailsec_rs::analysis::CompositeAnalyzer;
//! use mailsec_rs::config::Config;
//! use mailsec_rs::utils::DnsResolver;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let resolver = Arc::new(DnsResolver::new(&config.dns));
//!
//!     let analyzer =
//!         CompositeAnalyzer::from_config(&config.analysis, resolver.clone(), resolver, None);
//!     let report = analyzer.analyze("example.com", None).await;
//!
//!     println!("{}: {}/10", report.domain, report.overall_score.value);
//! }
//! ```
//!
//! # Modules
//!
//! - [`analysis`]: record parsers, scorers and analyzers
//! - [`api`]: HTTP API
//! - [`authentication`]: optional external SPF verifier
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`security`]: request rate limiting
//! - [`utils`]: DNS lookups and domain normalization

pub mod analysis;
pub mod api;
pub mod authentication;
pub mod config;
pub mod error;
pub mod logging;
pub mod security;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{MailSecError, Result};
