//! DKIM public-key record analysis

use super::result::{AnalysisResult, ParsedRecord};
use super::score::{Assessment, LevelThresholds, ScoreBreakdown, ScoreCard};
use super::tags::{self, ParsedPolicy, TagTable};
use crate::error::{MailSecError, Result};
use crate::utils::dns::{select_txt_record, TxtResolver};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DKIM_OUT_OF: f64 = 5.0;

pub const DEFAULT_SELECTOR: &str = "default";

/// Selectors published by common mail providers
pub const COMMON_SELECTORS: &[&str] = &[
    "default",
    "google",
    "selector1",
    "selector2",
    "k1",
    "mail",
    "dkim",
    "s1",
    "s2",
];

const DKIM_MARKERS: [&str; 3] = ["v=DKIM1", "k=rsa", "p="];

const DKIM_TAGS: TagTable = &[
    ("v", tags::text_value),
    ("k", tags::text_value),
    ("p", tags::text_value),
    ("h", tags::colon_list_value),
    ("s", tags::colon_list_value),
    ("t", tags::colon_list_value),
    ("n", tags::text_value),
];

/// Whether a TXT answer looks like a DKIM key record
pub fn is_dkim_record(record: &str) -> bool {
    DKIM_MARKERS.iter().any(|marker| record.contains(marker))
}

/// Parse a key record into its tags; DKIM has no mandatory tag
pub fn parse_dkim_record(record: &str) -> ParsedPolicy {
    tags::parse_policy(record, DKIM_TAGS, |policy| !policy.is_empty())
}

/// Score a DKIM key record out of 5
///
/// Marker presence is checked on the raw text; the key, key type and hash
/// algorithms come from the parsed tags.
pub fn score_dkim(record: &str, policy: &ParsedPolicy) -> Assessment {
    if !is_dkim_record(record) {
        return Assessment {
            score: ScoreBreakdown::zero(DKIM_OUT_OF, "No DKIM markers (v=DKIM1, k=rsa, p=) found"),
            warnings: vec!["Record does not look like a DKIM key".to_string()],
            recommendations: Vec::new(),
        };
    }

    let mut card = ScoreCard::new();
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    card.add(1.0, "DKIM record published");

    match policy.text("p") {
        Some(key) if !key.trim().is_empty() => card.add(2.0, "public key present"),
        Some(_) => {
            warnings.push("Empty p= tag: this key has been revoked".to_string());
            recommendations.push("Publish an active public key for this selector".to_string());
        }
        None => warnings.push("No p= tag: the record carries no public key".to_string()),
    }

    if policy
        .text("k")
        .is_some_and(|k| k.eq_ignore_ascii_case("rsa"))
    {
        card.add(1.0, "k=rsa key type");
    }

    if let Some(hashes) = policy.list("h") {
        if hashes.iter().any(|h| h.eq_ignore_ascii_case("sha256")) {
            card.add(1.0, "h=sha256 hash algorithm");
        } else if hashes.iter().any(|h| h.eq_ignore_ascii_case("sha1")) {
            card.add(0.5, "h=sha1 hash algorithm");
            recommendations.push("Upgrade the hash algorithm from sha1 to sha256".to_string());
        }
    }

    if policy
        .list("t")
        .is_some_and(|flags| flags.iter().any(|f| f.eq_ignore_ascii_case("y")))
    {
        warnings.push("t=y: the domain is in DKIM testing mode".to_string());
    }

    Assessment {
        score: card.finish(DKIM_OUT_OF, LevelThresholds::FIVE_POINT),
        warnings,
        recommendations,
    }
}

/// DKIM protocol analyzer
#[derive(Clone)]
pub struct DkimAnalyzer {
    resolver: Arc<dyn TxtResolver>,
    default_selector: String,
}

impl DkimAnalyzer {
    pub fn new(resolver: Arc<dyn TxtResolver>) -> Self {
        Self {
            resolver,
            default_selector: DEFAULT_SELECTOR.to_string(),
        }
    }

    /// Selector used when the caller supplies none
    pub fn with_default_selector(mut self, selector: impl Into<String>) -> Self {
        self.default_selector = selector.into();
        self
    }

    pub async fn analyze(&self, domain: &str, selector: Option<&str>) -> AnalysisResult {
        let selector = selector
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.default_selector.as_str());
        let record_name = format!("{}._domainkey.{}", selector, domain);
        info!("DKIM analysis starting for {} (selector {})", domain, selector);

        let record = match self.lookup(&record_name).await {
            Ok(record) => record,
            Err(e) => {
                warn!("DKIM lookup for {} failed: {}", record_name, e);
                let result =
                    AnalysisResult::from_error(domain, &e).with_record_name(&record_name);
                return if e.is_not_found() {
                    result.with_recommendations(selector_hints(domain, selector))
                } else {
                    result
                };
            }
        };
        debug!("DKIM record for {}: {}", record_name, record);

        let policy = parse_dkim_record(&record);
        let assessment = score_dkim(&record, &policy);
        info!(
            "DKIM score for {}: {}/{}",
            domain, assessment.score.value, assessment.score.out_of
        );

        let mut result = AnalysisResult::success(domain, &record_name, assessment.score);
        result.raw_record = Some(record);
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

        select_txt_record(&answers, is_dkim_record)
            .ok_or_else(|| MailSecError::NotFound("DKIM record not found".to_string()))
    }
}

fn selector_hints(domain: &str, tried: &str) -> Vec<String> {
    let mut hints = vec![format!(
        "No key at selector \"{}\"; check the s= tag of a DKIM-Signature header sent from {}",
        tried, domain
    )];
    hints.extend(
        COMMON_SELECTORS
            .iter()
            .filter(|s| **s != tried)
            .map(|s| format!("Try selector \"{}\" ({}._domainkey.{})", s, s, domain)),
    );
    hints
}
