//! Utility modules
//!
//! - [`dns`]: DNS lookup contracts and the trust-dns implementation
//! - [`domain`]: Domain input normalization

pub mod dns;
pub mod domain;

pub use dns::{DnsResolver, MxRecord, MxResolver, TxtResolver};
pub use domain::normalize_domain;
