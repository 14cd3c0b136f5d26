//! Result envelopes returned by the analyzers

use super::score::ScoreBreakdown;
use super::tags::ParsedPolicy;
use crate::error::MailSecError;
use crate::utils::dns::MxRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured form of the record that was analyzed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedRecord {
    /// DMARC and DKIM tag maps
    Tags(ParsedPolicy),
    /// SPF mechanisms in record order
    Mechanisms(Vec<String>),
    /// MX hosts sorted by ascending priority
    MailExchangers(Vec<MxRecord>),
}

/// Outcome of one protocol analysis
///
/// On failure only `domain`, `error` and context fields are set; there is no score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_record: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ParsedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanations: Option<BTreeMap<String, String>>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreBreakdown>,
}

impl AnalysisResult {
    /// Successful analysis with its score; other fields are filled by the caller
    pub fn success(domain: &str, record_name: &str, score: ScoreBreakdown) -> Self {
        Self {
            success: true,
            domain: domain.to_string(),
            record_name: Some(record_name.to_string()),
            error: None,
            raw_record: None,
            parsed: None,
            explanations: None,
            warnings: Vec::new(),
            recommendations: Vec::new(),
            score: Some(score),
        }
    }

    /// Failed analysis
    pub fn failure(domain: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            domain: domain.to_string(),
            record_name: None,
            error: Some(error.into()),
            raw_record: None,
            parsed: None,
            explanations: None,
            warnings: Vec::new(),
            recommendations: Vec::new(),
            score: None,
        }
    }

    pub fn from_error(domain: &str, err: &MailSecError) -> Self {
        Self::failure(domain, err.to_string())
    }

    pub fn with_record_name(mut self, record_name: impl Into<String>) -> Self {
        self.record_name = Some(record_name.into());
        self
    }

    pub fn with_recommendations<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations.extend(hints.into_iter().map(Into::into));
        self
    }
}

/// Four protocol results folded into one overall score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    pub domain: String,
    pub checked_at: DateTime<Utc>,
    pub dmarc: AnalysisResult,
    pub spf: AnalysisResult,
    pub dkim: AnalysisResult,
    pub mx: AnalysisResult,
    /// Weighted sum of succeeded protocol scores
    pub points: f64,
    /// Weighted sum of succeeded protocol maximums
    pub possible_points: f64,
    pub overall_score: ScoreBreakdown,
}

impl CompositeResult {
    pub fn results(&self) -> [(&'static str, &AnalysisResult); 4] {
        [
            ("dmarc", &self.dmarc),
            ("spf", &self.spf),
            ("dkim", &self.dkim),
            ("mx", &self.mx),
        ]
    }
}
