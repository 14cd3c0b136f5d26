//! External authentication verifier
//!
//! Optional collaborator whose report is merged into DMARC and SPF
//! breakdowns as advisory detail.

pub mod types;
pub mod verifier;

pub use types::{AuthenticationStatus, VerifierReport, VerifierStatus};
pub use verifier::{advisory_report, AuthVerifier, MailAuthVerifier};
