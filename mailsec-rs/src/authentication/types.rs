use serde::{Deserialize, Serialize};

/// Authentication status reported by a verifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationStatus {
    /// Authentication passed
    Pass,
    /// Authentication failed
    Fail,
    /// Temporary error (DNS timeout, etc.)
    TempError,
    /// Permanent error (broken record, etc.)
    PermError,
    /// Neutral (policy allows but doesn't endorse)
    Neutral,
    /// Softfail (policy suggests reject but not enforced)
    SoftFail,
    /// Nothing published to evaluate
    None,
}

impl std::fmt::Display for AuthenticationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthenticationStatus::Pass => write!(f, "pass"),
            AuthenticationStatus::Fail => write!(f, "fail"),
            AuthenticationStatus::TempError => write!(f, "temperror"),
            AuthenticationStatus::PermError => write!(f, "permerror"),
            AuthenticationStatus::Neutral => write!(f, "neutral"),
            AuthenticationStatus::SoftFail => write!(f, "softfail"),
            AuthenticationStatus::None => write!(f, "none"),
        }
    }
}

/// Status block of a verifier report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierStatus {
    pub result: String,
}

/// Opaque output of an external authentication verifier
///
/// Only ever rendered as advisory detail lines; it never changes a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierReport {
    pub status: VerifierStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl VerifierReport {
    pub fn new(status: AuthenticationStatus, info: Option<String>) -> Self {
        Self {
            status: VerifierStatus {
                result: status.to_string(),
            },
            info,
        }
    }

    /// Lines appended to a score breakdown
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Verifier status: {}", self.status.result)];
        if let Some(info) = &self.info {
            lines.push(format!("Verifier info: {}", info));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_status_display() {
        assert_eq!(AuthenticationStatus::Pass.to_string(), "pass");
        assert_eq!(AuthenticationStatus::Fail.to_string(), "fail");
        assert_eq!(AuthenticationStatus::TempError.to_string(), "temperror");
        assert_eq!(AuthenticationStatus::PermError.to_string(), "permerror");
        assert_eq!(AuthenticationStatus::Neutral.to_string(), "neutral");
        assert_eq!(AuthenticationStatus::SoftFail.to_string(), "softfail");
        assert_eq!(AuthenticationStatus::None.to_string(), "none");
    }

    #[test]
    fn test_report_detail_lines() {
        let report = VerifierReport::new(
            AuthenticationStatus::SoftFail,
            Some("Probe IP may not be authorized".to_string()),
        );
        assert_eq!(
            report.detail_lines(),
            vec![
                "Verifier status: softfail".to_string(),
                "Verifier info: Probe IP may not be authorized".to_string(),
            ]
        );

        let bare = VerifierReport::new(AuthenticationStatus::Pass, None);
        assert_eq!(bare.detail_lines().len(), 1);
    }

    #[test]
    fn test_report_serialization_shape() {
        let report = VerifierReport::new(AuthenticationStatus::Pass, None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"]["result"], "pass");
        assert!(json.get("info").is_none());
    }
}
