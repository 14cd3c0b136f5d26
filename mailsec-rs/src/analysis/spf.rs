//! SPF (Sender Policy Framework) record analysis
//!
//! Looks up the `v=spf1` TXT record on the bare domain, splits it into its
//! mechanisms (order preserved, no evaluation) and scores it out of 5.

use super::result::{AnalysisResult, ParsedRecord};
use super::score::{Assessment, LevelThresholds, ScoreCard};
use crate::authentication::{advisory_report, AuthVerifier, VerifierReport};
use crate::error::{MailSecError, Result};
use crate::utils::dns::{select_txt_record, TxtResolver};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SPF_OUT_OF: f64 = 5.0;

/// RFC 7208 limit on terms that trigger DNS queries
pub const MAX_DNS_LOOKUPS: usize = 10;

const SPF_VERSION: &str = "v=spf1";

/// Split a record into its mechanism tokens, dropping the version tag
pub fn parse_spf_record(record: &str) -> Vec<String> {
    record
        .split(' ')
        .filter(|token| !token.is_empty())
        .filter(|token| !token.eq_ignore_ascii_case(SPF_VERSION))
        .map(str::to_string)
        .collect()
}

/// Split the qualifier off a mechanism, defaulting to `+`
fn split_qualifier(token: &str) -> (char, &str) {
    match token.chars().next() {
        Some(q @ ('+' | '-' | '~' | '?')) => (q, &token[1..]),
        _ => ('+', token),
    }
}

/// Lower-cased mechanism or modifier name: `include`, `a`, `mx`, `redirect`...
fn mechanism_name(token: &str) -> String {
    let (_, body) = split_qualifier(token);
    body.split([':', '/', '='])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn mechanism_target(token: &str) -> Option<&str> {
    let (_, body) = split_qualifier(token);
    body.split_once([':', '='])
        .map(|(_, target)| target)
        .filter(|target| !target.is_empty())
}

fn dns_lookup_count(mechanisms: &[String]) -> usize {
    mechanisms
        .iter()
        .filter(|m| {
            matches!(
                mechanism_name(m).as_str(),
                "include" | "a" | "mx" | "ptr" | "exists" | "redirect"
            )
        })
        .count()
}

/// Score SPF mechanisms out of 5
pub fn score_spf(mechanisms: &[String], verifier: Option<&VerifierReport>) -> Assessment {
    let mut card = ScoreCard::new();
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    card.add(1.0, "valid SPF format (v=spf1)");

    if mechanisms.iter().any(|m| mechanism_name(m) == "include") {
        card.add(1.0, "include: delegates to third-party senders");
    }

    if mechanisms
        .iter()
        .any(|m| matches!(mechanism_name(m).as_str(), "a" | "mx"))
    {
        card.add(1.0, "a/mx mechanism authorizes the domain's own hosts");
    }

    match mechanisms.last().map(|m| m.to_ascii_lowercase()).as_deref() {
        Some("-all") => card.add(2.0, "-all: unauthorized senders hard fail"),
        Some("~all") => card.add(1.5, "~all: unauthorized senders soft fail"),
        Some("?all") => {
            card.add(0.5, "?all: no assertion about unauthorized senders");
            recommendations
                .push("Strengthen ?all to ~all or -all to protect the domain".to_string());
        }
        last => {
            warnings.push("SPF record must end with an all mechanism".to_string());
            recommendations.push(
                "End the record with -all (or ~all while testing)".to_string(),
            );
            if matches!(last, Some("+all") | Some("all")) {
                warnings.push(
                    "+all authorizes every host on the internet to send for this domain"
                        .to_string(),
                );
            }
        }
    }

    let lookups = dns_lookup_count(mechanisms);
    if lookups > MAX_DNS_LOOKUPS {
        warnings.push(format!(
            "Record needs {} DNS lookups; receivers stop at {} and return a permanent error",
            lookups, MAX_DNS_LOOKUPS
        ));
        recommendations.push(
            "Flatten nested include: chains to stay within 10 DNS lookups".to_string(),
        );
    }

    if mechanisms.iter().any(|m| mechanism_name(m) == "ptr") {
        warnings.push("The ptr mechanism is deprecated and slow".to_string());
    }

    if let Some(report) = verifier {
        for line in report.detail_lines() {
            card.note(line);
        }
    }

    Assessment {
        score: card.finish(SPF_OUT_OF, LevelThresholds::FIVE_POINT),
        warnings,
        recommendations,
    }
}

fn qualifier_result(qualifier: char) -> &'static str {
    match qualifier {
        '-' => "fail",
        '~' => "softfail",
        '?' => "neutral",
        _ => "pass",
    }
}

fn explain_mechanism(token: &str) -> String {
    let (qualifier, _) = split_qualifier(token);
    let target = mechanism_target(token);
    let name = mechanism_name(token);

    let text = match name.as_str() {
        "all" => {
            return match qualifier {
                '-' => "All other senders fail SPF (hard fail)".to_string(),
                '~' => "All other senders soft-fail SPF (accept but mark)".to_string(),
                '?' => "No assertion is made about other senders (neutral)".to_string(),
                _ => "Every sender on the internet passes SPF".to_string(),
            };
        }
        "include" => format!(
            "Authorize the senders listed in the SPF record of {}",
            target.unwrap_or("(missing domain)")
        ),
        "a" => format!(
            "Authorize the A/AAAA addresses of {}",
            target.unwrap_or("this domain")
        ),
        "mx" => format!(
            "Authorize the mail servers (MX) of {}",
            target.unwrap_or("this domain")
        ),
        "ip4" => format!("Authorize IPv4 address or range {}", target.unwrap_or("?")),
        "ip6" => format!("Authorize IPv6 address or range {}", target.unwrap_or("?")),
        "ptr" => "Authorize hosts by reverse DNS name (deprecated)".to_string(),
        "exists" => format!(
            "Match when {} resolves to an address",
            target.unwrap_or("(missing domain)")
        ),
        "redirect" => {
            return format!(
                "Use the SPF record of {} instead of this one",
                target.unwrap_or("(missing domain)")
            );
        }
        "exp" => {
            return format!(
                "Failure explanation text is published at {}",
                target.unwrap_or("(missing domain)")
            );
        }
        _ => return "Unrecognized mechanism".to_string(),
    };

    if qualifier == '+' {
        text
    } else {
        format!("{} (result: {})", text, qualifier_result(qualifier))
    }
}

/// Plain-language description of each mechanism
pub fn explain_spf(mechanisms: &[String]) -> BTreeMap<String, String> {
    mechanisms
        .iter()
        .map(|m| (m.clone(), explain_mechanism(m)))
        .collect()
}

/// SPF protocol analyzer
#[derive(Clone)]
pub struct SpfAnalyzer {
    resolver: Arc<dyn TxtResolver>,
    verifier: Option<Arc<dyn AuthVerifier>>,
    verifier_timeout: Duration,
}

impl SpfAnalyzer {
    pub fn new(resolver: Arc<dyn TxtResolver>) -> Self {
        Self {
            resolver,
            verifier: None,
            verifier_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn AuthVerifier>, timeout: Duration) -> Self {
        self.verifier = Some(verifier);
        self.verifier_timeout = timeout;
        self
    }

    pub async fn analyze(&self, domain: &str) -> AnalysisResult {
        info!("SPF analysis starting for {}", domain);

        let (record, published) = match self.lookup(domain).await {
            Ok(found) => found,
            Err(e) => {
                warn!("SPF lookup for {} failed: {}", domain, e);
                let result = AnalysisResult::from_error(domain, &e).with_record_name(domain);
                return if e.is_not_found() {
                    result.with_recommendations([
                        format!(
                            "Publish a TXT record at {} such as \"v=spf1 mx ~all\"",
                            domain
                        ),
                        "Add an include: for every service that sends mail for the domain"
                            .to_string(),
                        "End the record with -all (or ~all while testing)".to_string(),
                    ])
                } else {
                    result
                };
            }
        };
        debug!("SPF record for {}: {}", domain, record);

        let mechanisms = parse_spf_record(&record);
        let report = advisory_report(self.verifier.as_ref(), domain, self.verifier_timeout).await;
        let mut assessment = score_spf(&mechanisms, report.as_ref());
        if published > 1 {
            assessment.warnings.push(format!(
                "{} SPF records are published; receivers treat this as a permanent error",
                published
            ));
        }
        info!(
            "SPF score for {}: {}/{}",
            domain, assessment.score.value, assessment.score.out_of
        );

        let mut result = AnalysisResult::success(domain, domain, assessment.score);
        result.raw_record = Some(record);
        result.explanations = Some(explain_spf(&mechanisms));
        result.parsed = Some(ParsedRecord::Mechanisms(mechanisms));
        result.warnings = assessment.warnings;
        result.recommendations = assessment.recommendations;
        result
    }

    /// First SPF record and the number of SPF records published
    async fn lookup(&self, domain: &str) -> Result<(String, usize)> {
        let answers = match self.resolver.resolve_txt(domain).await {
            Ok(answers) => answers,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        let is_spf = |record: &str| record.starts_with(SPF_VERSION);
        let published = answers
            .iter()
            .filter(|segments| is_spf(&segments.concat()))
            .count();

        select_txt_record(&answers, is_spf)
            .map(|record| (record, published))
            .ok_or_else(|| MailSecError::NotFound("SPF record not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::score::ScoreLevel;
    use crate::utils::dns::MockTxtResolver;

    fn mechanisms(record: &str) -> Vec<String> {
        parse_spf_record(record)
    }

    #[test]
    fn test_parse_preserves_order() {
        assert_eq!(
            mechanisms("v=spf1 ip4:192.0.2.0/24  include:_spf.google.com -all"),
            vec!["ip4:192.0.2.0/24", "include:_spf.google.com", "-all"]
        );
        assert!(mechanisms("v=spf1").is_empty());
    }

    #[test]
    fn test_google_include_softfail() {
        let assessment = score_spf(&mechanisms("v=spf1 include:_spf.google.com ~all"), None);
        assert_eq!(assessment.score.value, 3.5);
        assert_eq!(assessment.score.level, ScoreLevel::Good);
        assert!(assessment.warnings.is_empty());
    }

    #[test]
    fn test_full_marks() {
        let assessment = score_spf(&mechanisms("v=spf1 mx include:spf.example.net -all"), None);
        assert_eq!(assessment.score.value, 5.0);
        assert_eq!(assessment.score.level, ScoreLevel::Excellent);
    }

    #[test]
    fn test_a_and_mx_detection_ignores_all() {
        let plain = score_spf(&mechanisms("v=spf1 ip4:192.0.2.1 ~all"), None);
        assert_eq!(plain.score.value, 2.5);

        let with_a = score_spf(&mechanisms("v=spf1 a:mail.example.com ~all"), None);
        assert_eq!(with_a.score.value, 3.5);

        let with_mx = score_spf(&mechanisms("v=spf1 +mx/24 ~all"), None);
        assert_eq!(with_mx.score.value, 3.5);
    }

    #[test]
    fn test_neutral_all() {
        let assessment = score_spf(&mechanisms("v=spf1 ?all"), None);
        assert_eq!(assessment.score.value, 1.5);
        assert_eq!(assessment.score.level, ScoreLevel::Poor);
        assert!(!assessment.recommendations.is_empty());
    }

    #[test]
    fn test_missing_all() {
        let assessment = score_spf(&mechanisms("v=spf1 include:a.example"), None);
        assert_eq!(assessment.score.value, 2.0);
        assert!(assessment
            .warnings
            .contains(&"SPF record must end with an all mechanism".to_string()));
    }

    #[test]
    fn test_plus_all_warns() {
        let assessment = score_spf(&mechanisms("v=spf1 +all"), None);
        assert_eq!(assessment.score.value, 1.0);
        assert!(assessment.warnings.iter().any(|w| w.contains("every host")));
    }

    #[test]
    fn test_too_many_lookups() {
        let record = format!(
            "v=spf1 {} -all",
            (0..11)
                .map(|i| format!("include:s{}.example", i))
                .collect::<Vec<_>>()
                .join(" ")
        );
        let assessment = score_spf(&mechanisms(&record), None);
        assert!(assessment.warnings.iter().any(|w| w.contains("11 DNS lookups")));
        assert_eq!(assessment.score.value, 4.0);
    }

    #[test]
    fn test_explanations() {
        let explanations = explain_spf(&mechanisms(
            "v=spf1 include:_spf.google.com ip4:192.0.2.0/24 ~mx redirect=other.example -all",
        ));

        assert!(explanations["include:_spf.google.com"].contains("_spf.google.com"));
        assert!(explanations["ip4:192.0.2.0/24"].contains("192.0.2.0/24"));
        assert!(explanations["~mx"].contains("softfail"));
        assert!(explanations["redirect=other.example"].contains("other.example"));
        assert!(explanations["-all"].contains("hard fail"));
    }

    #[tokio::test]
    async fn test_analyze_reports_multiple_records() {
        let mut mock = MockTxtResolver::new();
        mock.expect_resolve_txt()
            .withf(|name| name == "example.com")
            .returning(|_| {
                Ok(vec![
                    vec!["v=spf1 ".to_string(), "-all".to_string()],
                    vec!["v=spf1 ~all".to_string()],
                ])
            });

        let result = SpfAnalyzer::new(Arc::new(mock)).analyze("example.com").await;
        assert!(result.success);
        assert_eq!(result.raw_record.as_deref(), Some("v=spf1 -all"));
        assert_eq!(result.score.unwrap().value, 3.0);
        assert!(result.warnings.iter().any(|w| w.contains("2 SPF records")));
    }

    #[tokio::test]
    async fn test_analyze_not_found() {
        let mut mock = MockTxtResolver::new();
        mock.expect_resolve_txt()
            .returning(|_| Ok(vec![vec!["v=DMARC1; p=none".to_string()]]));

        let result = SpfAnalyzer::new(Arc::new(mock)).analyze("example.com").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("SPF record not found"));
        assert_eq!(result.recommendations.len(), 3);
    }
}
