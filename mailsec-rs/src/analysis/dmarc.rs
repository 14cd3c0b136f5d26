//! DMARC (Domain-based Message Authentication, Reporting & Conformance)
//!
//! Fetches the policy published at `_dmarc.<domain>`, parses it, scores it
//! out of 10 and explains every tag in plain language.
//!
//! # Example
//! ```no_run
//! use mailsec_rs::analysis::DmarcAnalyzer;
//! use mailsec_rs::utils::DnsResolver;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let analyzer = DmarcAnalyzer::new(Arc::new(DnsResolver::default()));
//! let result = analyzer.analyze("example.com").await;
//!
//! if let Some(score) = result.score {
//!     println!("DMARC: {}/{} ({})", score.value, score.out_of, score.level);
//! }
//! # }
//! ```

use super::result::{AnalysisResult, ParsedRecord};
use super::score::{Assessment, LevelThresholds, ScoreCard};
use super::tags::{self, ParsedPolicy, TagTable, TagValue};
use crate::authentication::{advisory_report, AuthVerifier, VerifierReport};
use crate::error::{MailSecError, Result};
use crate::utils::dns::{select_txt_record, TxtResolver};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DMARC_OUT_OF: f64 = 10.0;

/// Value used when `pct` is absent or unusable
pub const DEFAULT_PCT: u32 = 100;

/// Value used when `ri` is absent or unusable (one day)
pub const DEFAULT_RI: u32 = 86400;

const DMARC_TAGS: TagTable = &[
    ("v", tags::text_value),
    ("p", tags::text_value),
    ("sp", tags::text_value),
    ("adkim", tags::text_value),
    ("aspf", tags::text_value),
    ("pct", pct_value),
    ("fo", tags::text_value),
    ("rf", tags::text_value),
    ("ri", ri_value),
    ("rua", tags::list_value),
    ("ruf", tags::list_value),
];

fn pct_value(raw: &str) -> TagValue {
    let pct = raw
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pct| *pct <= 100)
        .unwrap_or(DEFAULT_PCT);
    TagValue::Int(pct)
}

fn ri_value(raw: &str) -> TagValue {
    let ri = raw
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|ri| *ri > 0)
        .unwrap_or(DEFAULT_RI);
    TagValue::Int(ri)
}

/// Parse a DMARC record
///
/// Uses the strict tag-list parser first and falls back to the lenient one
/// when that yields nothing or no `v` tag. Fails when `v` does not name
/// `DMARC1`.
pub fn parse_dmarc_record(record: &str) -> Result<ParsedPolicy> {
    let policy = tags::parse_policy(record, DMARC_TAGS, |p| p.contains("v"));

    match policy.text("v") {
        Some(version) if version.contains("DMARC1") => Ok(policy),
        Some(version) => Err(MailSecError::Parse(format!(
            "unsupported DMARC version '{}', expected v=DMARC1",
            version
        ))),
        None => Err(MailSecError::Parse(
            "missing v=DMARC1 version tag".to_string(),
        )),
    }
}

/// Effective `pct`, defaulting to 100
pub fn effective_pct(policy: &ParsedPolicy) -> u32 {
    policy.int("pct").unwrap_or(DEFAULT_PCT)
}

/// Effective `ri`, defaulting to 86400 seconds
pub fn effective_ri(policy: &ParsedPolicy) -> u32 {
    policy.int("ri").unwrap_or(DEFAULT_RI)
}

fn has_addresses(policy: &ParsedPolicy, tag: &str) -> bool {
    policy.list(tag).map_or(false, |uris| !uris.is_empty())
}

fn is_strict(policy: &ParsedPolicy, tag: &str) -> bool {
    policy
        .text(tag)
        .map_or(false, |mode| mode.eq_ignore_ascii_case("s"))
}

/// Score a parsed DMARC policy out of 10
pub fn score_dmarc(policy: &ParsedPolicy, verifier: Option<&VerifierReport>) -> Assessment {
    let mut card = ScoreCard::new();
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    match policy.text("p").map(str::to_ascii_lowercase).as_deref() {
        Some("reject") => card.add(5.0, "p=reject: failing mail is rejected"),
        Some("quarantine") => {
            card.add(3.0, "p=quarantine: failing mail is quarantined");
            recommendations.push(
                "Upgrade to p=reject once reports confirm legitimate mail passes".to_string(),
            );
        }
        Some("none") => {
            card.add(0.0, "p=none: monitoring only");
            warnings.push(
                "Policy p=none provides no protection against spoofing".to_string(),
            );
            recommendations.push(
                "Roll out enforcement in stages: p=none, then p=quarantine, then p=reject"
                    .to_string(),
            );
        }
        _ => {
            let literal = policy.text("p").unwrap_or("(missing)");
            card.add(-2.0, "missing or unrecognized policy");
            warnings.push(format!("Missing or unrecognized DMARC policy: {}", literal));
            recommendations
                .push("Set p= to one of none, quarantine or reject".to_string());
        }
    }

    if has_addresses(policy, "rua") {
        card.add(1.0, "aggregate reports (rua) configured");
    } else {
        warnings.push("No aggregate report address (rua) configured".to_string());
        recommendations.push(
            "Add rua=mailto:<address> to receive daily aggregate reports".to_string(),
        );
    }

    if has_addresses(policy, "ruf") {
        card.add(1.0, "failure reports (ruf) configured");
    } else {
        recommendations.push(
            "Add ruf=mailto:<address> to receive per-message failure reports".to_string(),
        );
    }

    if let Some(sp) = policy.text("sp") {
        card.add(1.0, "subdomain policy (sp) set");
        if sp.eq_ignore_ascii_case("reject") {
            card.add(0.5, "sp=reject: subdomains fully protected");
        }
    }

    let pct = effective_pct(policy);
    if pct < 100 {
        let penalty = f64::from(100 - pct) / 50.0;
        card.add(-penalty, format!("pct={}: policy covers only part of the mail", pct));
        warnings.push(format!("Policy only applies to {}% of messages", pct));
        if pct < 50 {
            warnings.push(format!(
                "With pct={} most failing messages escape the policy",
                pct
            ));
        }
        recommendations.push("Raise pct to 100 once the policy is stable".to_string());
    } else {
        card.add(0.5, "pct=100: policy covers all mail");
    }

    if is_strict(policy, "adkim") {
        card.add(0.5, "adkim=s: strict DKIM alignment");
    }
    if is_strict(policy, "aspf") {
        card.add(0.5, "aspf=s: strict SPF alignment");
    }

    if let Some(report) = verifier {
        for line in report.detail_lines() {
            card.note(line);
        }
    }

    Assessment {
        score: card.finish(DMARC_OUT_OF, LevelThresholds::TEN_POINT),
        warnings,
        recommendations,
    }
}

type Explainer = fn(&TagValue) -> String;

const EXPLANATIONS: &[(&str, Explainer)] = &[
    ("v", explain_version),
    ("p", explain_policy),
    ("sp", explain_subdomain_policy),
    ("adkim", explain_dkim_alignment),
    ("aspf", explain_spf_alignment),
    ("pct", explain_percentage),
    ("fo", explain_failure_options),
    ("rf", explain_report_format),
    ("ri", explain_interval),
    ("rua", explain_aggregate_uris),
    ("ruf", explain_failure_uris),
];

fn display(value: &TagValue) -> String {
    match value {
        TagValue::Text(s) => s.clone(),
        TagValue::Int(n) => n.to_string(),
        TagValue::List(items) => items.join(", "),
    }
}

fn policy_meaning(value: &TagValue) -> String {
    let raw = display(value);
    match raw.to_ascii_lowercase().as_str() {
        "none" => "none (no action taken, failing mail is delivered and only reported)".to_string(),
        "quarantine" => "quarantine (failing mail is treated as suspicious, e.g. sent to spam)".to_string(),
        "reject" => "reject (failing mail is refused outright)".to_string(),
        _ => format!("unrecognized value '{}'", raw),
    }
}

fn alignment_meaning(value: &TagValue) -> String {
    match display(value).to_ascii_lowercase().as_str() {
        "s" => "strict (the authenticated domain must exactly match the From domain)".to_string(),
        _ => "relaxed (subdomains of the From domain also align)".to_string(),
    }
}

fn explain_version(value: &TagValue) -> String {
    format!("DMARC version: {}", display(value))
}

fn explain_policy(value: &TagValue) -> String {
    format!("Policy for this domain: {}", policy_meaning(value))
}

fn explain_subdomain_policy(value: &TagValue) -> String {
    format!("Policy for subdomains: {}", policy_meaning(value))
}

fn explain_dkim_alignment(value: &TagValue) -> String {
    format!("DKIM alignment mode: {}", alignment_meaning(value))
}

fn explain_spf_alignment(value: &TagValue) -> String {
    format!("SPF alignment mode: {}", alignment_meaning(value))
}

fn explain_percentage(value: &TagValue) -> String {
    format!("The policy applies to {}% of failing messages", display(value))
}

fn explain_report_format(value: &TagValue) -> String {
    format!("Failure reports are formatted as: {}", display(value))
}

fn explain_aggregate_uris(value: &TagValue) -> String {
    format!("Aggregate reports are sent to: {}", display(value))
}

fn explain_failure_uris(value: &TagValue) -> String {
    format!("Failure (forensic) reports are sent to: {}", display(value))
}

fn explain_failure_options(value: &TagValue) -> String {
    let raw = display(value);
    let options: Vec<&str> = raw
        .split(':')
        .map(|option| match option.trim() {
            "0" => "when all authentication mechanisms fail",
            "1" => "when any authentication mechanism fails",
            "d" => "when DKIM fails",
            "s" => "when SPF fails",
            _ => "for an unrecognized option",
        })
        .collect();
    format!("Failure reports are generated {}", options.join(", "))
}

fn explain_interval(value: &TagValue) -> String {
    let seconds = value.as_int().unwrap_or(DEFAULT_RI);
    let days = if seconds % 86400 == 0 {
        (seconds / 86400).to_string()
    } else {
        format!("{:.2}", f64::from(seconds) / 86400.0)
    };
    format!("Aggregate reports are requested every {} day(s)", days)
}

/// Plain-language description of every tag in the policy
pub fn explain_dmarc(policy: &ParsedPolicy) -> BTreeMap<String, String> {
    policy
        .iter()
        .map(|(tag, value)| {
            let text = match EXPLANATIONS.iter().find(|(name, _)| *name == tag.as_str()) {
                Some((_, explain)) => explain(value),
                None => format!("Unrecognized tag, kept as published: {}", display(value)),
            };
            (tag.clone(), text)
        })
        .collect()
}

/// DMARC protocol analyzer
#[derive(Clone)]
pub struct DmarcAnalyzer {
    resolver: Arc<dyn TxtResolver>,
    verifier: Option<Arc<dyn AuthVerifier>>,
    verifier_timeout: Duration,
}

impl DmarcAnalyzer {
    pub fn new(resolver: Arc<dyn TxtResolver>) -> Self {
        Self {
            resolver,
            verifier: None,
            verifier_timeout: Duration::from_secs(5),
        }
    }

    /// Merge an external verifier's report into the score details
    pub fn with_verifier(mut self, verifier: Arc<dyn AuthVerifier>, timeout: Duration) -> Self {
        self.verifier = Some(verifier);
        self.verifier_timeout = timeout;
        self
    }

    /// Analyze the DMARC policy of an already-normalized domain
    pub async fn analyze(&self, domain: &str) -> AnalysisResult {
        let record_name = format!("_dmarc.{}", domain);
        info!("DMARC analysis starting for {}", domain);

        let record = match self.lookup(&record_name).await {
            Ok(record) => record,
            Err(e) => {
                warn!("DMARC lookup for {} failed: {}", domain, e);
                let result =
                    AnalysisResult::from_error(domain, &e).with_record_name(&record_name);
                return if e.is_not_found() {
                    result.with_recommendations([
                        format!(
                            "Publish a TXT record at {} such as \"v=DMARC1; p=none; rua=mailto:dmarc@{}\"",
                            record_name, domain
                        ),
                        "Start with p=none to collect reports, then move to quarantine and reject"
                            .to_string(),
                    ])
                } else {
                    result
                };
            }
        };
        debug!("DMARC record for {}: {}", domain, record);

        let policy = match parse_dmarc_record(&record) {
            Ok(policy) => policy,
            Err(e) => {
                warn!("DMARC record for {} is invalid: {}", domain, e);
                let mut result =
                    AnalysisResult::from_error(domain, &e).with_record_name(&record_name);
                result.raw_record = Some(record);
                return result;
            }
        };

        let report = advisory_report(self.verifier.as_ref(), domain, self.verifier_timeout).await;
        let assessment = score_dmarc(&policy, report.as_ref());
        info!(
            "DMARC score for {}: {}/{}",
            domain, assessment.score.value, assessment.score.out_of
        );

        let mut result = AnalysisResult::success(domain, &record_name, assessment.score);
        result.raw_record = Some(record);
        result.explanations = Some(explain_dmarc(&policy));
        result.parsed = Some(ParsedRecord::Tags(policy));
        result.warnings = assessment.warnings;
        result.recommendations = assessment.recommendations;
        result
    }

    async fn lookup(&self, record_name: &str) -> Result<String> {
        let answers = match self.resolver.resolve_txt(record_name).await {
            Ok(answers) => answers,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        select_txt_record(&answers, |record| record.starts_with("v=DMARC1"))
            .ok_or_else(|| MailSecError::NotFound("DMARC record not found".to_string()))
    }
}
