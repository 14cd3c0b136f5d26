//! Composite analysis: all four protocols in parallel, folded into one score

use super::dkim::DkimAnalyzer;
use super::dmarc::DmarcAnalyzer;
use super::mx::MxAnalyzer;
use super::result::{AnalysisResult, CompositeResult};
use super::score::{round_to, LevelThresholds, ScoreBreakdown};
use super::spf::SpfAnalyzer;
use crate::authentication::AuthVerifier;
use crate::config::{AnalysisConfig, CompositeWeights};
use crate::utils::dns::{MxResolver, TxtResolver};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{error, info};

pub const OVERALL_OUT_OF: f64 = 10.0;

/// Runs the protocol analyzers concurrently
///
/// Each analyzer runs in its own task, so a panic in one is reported as that
/// protocol's failure and never cancels the others.
#[derive(Clone)]
pub struct CompositeAnalyzer {
    dmarc: DmarcAnalyzer,
    spf: SpfAnalyzer,
    dkim: DkimAnalyzer,
    mx: MxAnalyzer,
    weights: CompositeWeights,
}

impl CompositeAnalyzer {
    pub fn new(
        dmarc: DmarcAnalyzer,
        spf: SpfAnalyzer,
        dkim: DkimAnalyzer,
        mx: MxAnalyzer,
        weights: CompositeWeights,
    ) -> Self {
        Self {
            dmarc,
            spf,
            dkim,
            mx,
            weights,
        }
    }

    /// Wire all four analyzers from the analysis configuration
    pub fn from_config(
        config: &AnalysisConfig,
        txt: Arc<dyn TxtResolver>,
        mx: Arc<dyn MxResolver>,
        verifier: Option<Arc<dyn AuthVerifier>>,
    ) -> Self {
        let mut dmarc = DmarcAnalyzer::new(txt.clone());
        let mut spf = SpfAnalyzer::new(txt.clone());
        if let Some(verifier) = verifier {
            let timeout = config.verifier_timeout();
            dmarc = dmarc.with_verifier(verifier.clone(), timeout);
            spf = spf.with_verifier(verifier, timeout);
        }

        Self::new(
            dmarc,
            spf,
            DkimAnalyzer::new(txt).with_default_selector(config.default_dkim_selector.clone()),
            MxAnalyzer::new(mx),
            config.weights,
        )
    }

    pub fn dmarc(&self) -> &DmarcAnalyzer {
        &self.dmarc
    }

    pub fn spf(&self) -> &SpfAnalyzer {
        &self.spf
    }

    pub fn dkim(&self) -> &DkimAnalyzer {
        &self.dkim
    }

    pub fn mx(&self) -> &MxAnalyzer {
        &self.mx
    }

    pub async fn analyze(&self, domain: &str, selector: Option<&str>) -> CompositeResult {
        info!("Composite analysis starting for {}", domain);

        let dmarc = {
            let analyzer = self.dmarc.clone();
            let domain = domain.to_string();
            isolate(async move { analyzer.analyze(&domain).await })
        };
        let spf = {
            let analyzer = self.spf.clone();
            let domain = domain.to_string();
            isolate(async move { analyzer.analyze(&domain).await })
        };
        let dkim = {
            let analyzer = self.dkim.clone();
            let domain = domain.to_string();
            let selector = selector.map(str::to_string);
            isolate(async move { analyzer.analyze(&domain, selector.as_deref()).await })
        };
        let mx = {
            let analyzer = self.mx.clone();
            let domain = domain.to_string();
            isolate(async move { analyzer.analyze(&domain).await })
        };

        let (dmarc, spf, dkim, mx) = tokio::join!(dmarc, spf, dkim, mx);

        let dmarc = settle("DMARC", domain, dmarc);
        let spf = settle("SPF", domain, spf);
        let dkim = settle("DKIM", domain, dkim);
        let mx = settle("MX", domain, mx);

        let weighted = [
            (&dmarc, self.weights.dmarc),
            (&spf, self.weights.spf),
            (&dkim, self.weights.dkim),
            (&mx, self.weights.mx),
        ];
        let (points, possible_points) = weighted_totals(&weighted);
        let overall_score = overall_score(points, possible_points);
        info!(
            "Overall score for {}: {}/{} ({})",
            domain, overall_score.value, OVERALL_OUT_OF, overall_score.level
        );

        CompositeResult {
            domain: domain.to_string(),
            checked_at: Utc::now(),
            dmarc,
            spf,
            dkim,
            mx,
            points: round_to(points, 2),
            possible_points: round_to(possible_points, 2),
            overall_score,
        }
    }
}

/// Spawn an analyzer future on its own task
async fn isolate<F>(future: F) -> Result<AnalysisResult, JoinError>
where
    F: Future<Output = AnalysisResult> + Send + 'static,
{
    tokio::spawn(future).await
}

/// Turn a crashed task into that protocol's failure result
fn settle(protocol: &str, domain: &str, outcome: Result<AnalysisResult, JoinError>) -> AnalysisResult {
    outcome.unwrap_or_else(|e| {
        error!("{} analysis task for {} failed: {}", protocol, domain, e);
        AnalysisResult::failure(domain, format!("{} analysis failed: {}", protocol, e))
    })
}

/// Weighted score and maximum over the successful results
pub fn weighted_totals(results: &[(&AnalysisResult, f64)]) -> (f64, f64) {
    results
        .iter()
        .filter(|(result, _)| result.success)
        .filter_map(|(result, weight)| result.score.as_ref().map(|s| (s, *weight)))
        .fold((0.0, 0.0), |(points, possible), (score, weight)| {
            (points + weight * score.value, possible + weight * score.out_of)
        })
}

/// Normalize to a score out of 10, one decimal; 0 when nothing succeeded
pub fn overall_score(points: f64, possible_points: f64) -> ScoreBreakdown {
    if possible_points <= 0.0 {
        return ScoreBreakdown::zero(OVERALL_OUT_OF, "No protocol analysis succeeded");
    }

    let value = round_to(points / possible_points * OVERALL_OUT_OF, 1);
    ScoreBreakdown::new(
        value,
        OVERALL_OUT_OF,
        LevelThresholds::TEN_POINT,
        vec![format!(
            "{} of {} weighted points",
            round_to(points, 2),
            round_to(possible_points, 2)
        )],
    )
}
