// 분석 레코드 정제 파이프라인
// 기간 정규화 -> 일관성 검증 -> 신호 보강 순서로 레코드를 변환합니다.

pub mod consistency_validator;
pub mod duration_normalizer;
pub mod signal_enhancer;

pub use consistency_validator::{ConsistencyValidator, PatternFamily};
pub use duration_normalizer::{ALLOWED_DURATIONS, DurationNormalizer, normalize_duration};
pub use signal_enhancer::{SignalEnhancer, oversold_bounce_factor};

use crate::config::RefinerConfig;
use crate::diagnostics::{DiagnosticSink, LogSink, StageKind};
use crate::model::AnalysisResult;
use log::debug;

/// 합성 과매도 신호 패턴 이름
pub const MOMENTUM_OVERSOLD_SIGNAL: &str = "Momentum Oversold Signal";
/// 상승 레인징 반전 패턴 이름
pub const BULLISH_RANGING_REVERSAL: &str = "Bullish Ranging Reversal";
/// 하락 레인징 반전 패턴 이름
pub const BEARISH_RANGING_REVERSAL: &str = "Bearish Ranging Reversal";

/// 정제 단계 인터페이스
///
/// 모든 단계는 전체 레코드를 받아 전체 레코드를 돌려주는 순수 변환입니다.
pub trait RefinementStage: Send + Sync {
    /// 단계 종류
    fn kind(&self) -> StageKind;

    /// 레코드 변환
    ///
    /// # Arguments
    /// * `result` - 입력 레코드 (소유권 이전)
    /// * `sink` - 진단 이벤트 싱크
    ///
    /// # Returns
    /// * `AnalysisResult` - 새 레코드
    fn apply(&self, result: AnalysisResult, sink: &dyn DiagnosticSink) -> AnalysisResult;
}

/// 정제 파이프라인
///
/// 단계 순서는 고정입니다. 보강 단계의 잠재 패턴 추론은 검증된 패턴 집합을 전제로 합니다.
pub struct RefinementPipeline {
    stages: Vec<Box<dyn RefinementStage>>,
}

impl RefinementPipeline {
    /// 설정으로 파이프라인 생성
    pub fn new(config: &RefinerConfig) -> Self {
        let stages: Vec<Box<dyn RefinementStage>> = vec![
            Box::new(DurationNormalizer),
            Box::new(ConsistencyValidator::new(config.momentum.clone())),
            Box::new(SignalEnhancer::new(
                config.momentum.clone(),
                config.correction_rules.clone(),
            )),
        ];
        RefinementPipeline { stages }
    }

    /// 단계 종류 목록 (실행 순서)
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|stage| stage.kind()).collect()
    }

    /// 기본 싱크(`log`)로 정제 실행
    pub fn run(&self, result: AnalysisResult) -> AnalysisResult {
        self.run_with_sink(result, &LogSink)
    }

    /// 지정한 싱크로 정제 실행
    pub fn run_with_sink(&self, result: AnalysisResult, sink: &dyn DiagnosticSink) -> AnalysisResult {
        self.stages.iter().fold(result, |result, stage| {
            debug!("정제 단계 실행: {}", stage.kind());
            stage.apply(result, sink)
        })
    }
}

impl Default for RefinementPipeline {
    fn default() -> Self {
        Self::new(&RefinerConfig::default())
    }
}
