pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod model;
pub mod refiner;
pub mod service;

/// 설정 로더
pub mod config_loader;

pub use config::{CorrectionRule, FlagKeywords, MomentumThresholds, RefinerConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, LogSink, NoopSink, RecordingSink};
pub use error::{AnalysisError, AnalysisOutcome};
pub use ingest::{parse_response, parse_response_default};
pub use model::{AnalysisResult, Bias, Indicators, Pattern, Prediction};
pub use refiner::{RefinementPipeline, RefinementStage};
pub use service::{AnalysisSource, ChartAnalysisService, ChartImage, SourceError};
