//! MX record-set analysis

use super::result::{AnalysisResult, ParsedRecord};
use super::score::{Assessment, LevelThresholds, ScoreCard};
use crate::error::{MailSecError, Result};
use crate::utils::dns::{MxRecord, MxResolver};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MX_OUT_OF: f64 = 3.0;

/// Order records by ascending priority, keeping DNS order among equals
pub fn sort_by_priority(records: &mut [MxRecord]) {
    records.sort_by_key(|r| r.priority);
}

/// Score a sorted MX set out of 3
pub fn score_mx(records: &[MxRecord]) -> Assessment {
    let mut card = ScoreCard::new();
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    if !records.is_empty() {
        card.add(1.0, "MX records published");
    }

    if records.len() >= 2 {
        card.add(1.0, "multiple mail servers for redundancy");
    } else {
        recommendations.push("Add a backup MX host for redundancy".to_string());
    }

    let mut seen = HashSet::new();
    let distinct = records.iter().all(|r| seen.insert(r.priority));
    if distinct {
        if !records.is_empty() {
            card.add(1.0, "every priority is distinct");
        }
    } else {
        warnings.push(
            "Several MX records share a priority; delivery order between them is random"
                .to_string(),
        );
    }

    if records.iter().any(|r| r.exchange.is_empty() || r.exchange == ".") {
        warnings.push("Null MX present: this domain declares it accepts no mail".to_string());
    }

    Assessment {
        score: card.finish(MX_OUT_OF, LevelThresholds::THREE_POINT),
        warnings,
        recommendations,
    }
}

/// MX protocol analyzer
#[derive(Clone)]
pub struct MxAnalyzer {
    resolver: Arc<dyn MxResolver>,
}

impl MxAnalyzer {
    pub fn new(resolver: Arc<dyn MxResolver>) -> Self {
        Self { resolver }
    }

    pub async fn analyze(&self, domain: &str) -> AnalysisResult {
        info!("MX analysis starting for {}", domain);

        let mut records = match self.lookup(domain).await {
            Ok(records) => records,
            Err(e) => {
                warn!("MX lookup for {} failed: {}", domain, e);
                let result = AnalysisResult::from_error(domain, &e).with_record_name(domain);
                return if e.is_not_found() {
                    result.with_recommendations([
                        format!(
                            "Publish MX records for {} pointing at your mail servers",
                            domain
                        ),
                        "Use distinct priorities, lowest number for the primary server"
                            .to_string(),
                        "If the domain never receives mail, publish a null MX (priority 0, host \".\")"
                            .to_string(),
                    ])
                } else {
                    result
                };
            }
        };

        sort_by_priority(&mut records);
        debug!("{} MX record(s) for {}", records.len(), domain);

        let assessment = score_mx(&records);
        info!(
            "MX score for {}: {}/{}",
            domain, assessment.score.value, assessment.score.out_of
        );

        let mut result = AnalysisResult::success(domain, domain, assessment.score);
        result.raw_record = Some(
            records
                .iter()
                .map(|r| format!("{} {}", r.priority, r.exchange))
                .collect::<Vec<_>>()
                .join(", "),
        );
        result.parsed = Some(ParsedRecord::MailExchangers(records));
        result.warnings = assessment.warnings;
        result.recommendations = assessment.recommendations;
        result
    }

    async fn lookup(&self, domain: &str) -> Result<Vec<MxRecord>> {
        let records = match self.resolver.resolve_mx(domain).await {
            Ok(records) => records,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        if records.is_empty() {
            return Err(MailSecError::NotFound("MX records not found".to_string()));
        }
        Ok(records)
    }
}
