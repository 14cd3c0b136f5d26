//! Record parsing, scoring and explanation for DMARC, SPF, DKIM and MX

pub mod composite;
pub mod dkim;
pub mod dmarc;
pub mod mx;
pub mod result;
pub mod score;
pub mod spf;
pub mod tags;

pub use composite::CompositeAnalyzer;
pub use dkim::DkimAnalyzer;
pub use dmarc::DmarcAnalyzer;
pub use mx::MxAnalyzer;
pub use result::{AnalysisResult, CompositeResult, ParsedRecord};
pub use score::{LevelThresholds, ScoreBreakdown, ScoreLevel};
pub use spf::SpfAnalyzer;
pub use tags::{ParsedPolicy, TagValue};
