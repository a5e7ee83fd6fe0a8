use super::RefinementStage;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, StageKind};
use crate::model::AnalysisResult;

/// 허용되는 거래 기간(분), 오름차순
pub const ALLOWED_DURATIONS: [u32; 3] = [1, 2, 5];

/// 기간을 허용 집합의 가장 가까운 값으로 정규화
///
/// 거리가 같으면 더 작은 값을 선택합니다 (1.5 -> 1, 3.5 -> 2).
/// NaN은 가장 작은 값으로 정규화됩니다.
pub fn normalize_duration(duration: f64) -> u32 {
    let shortest = ALLOWED_DURATIONS[0];
    let longest = ALLOWED_DURATIONS[ALLOWED_DURATIONS.len() - 1];
    if duration.is_nan() {
        return shortest;
    }
    let duration = duration.clamp(shortest as f64, longest as f64);

    let mut best = shortest;
    for &candidate in &ALLOWED_DURATIONS[1..] {
        // 엄격히 더 가까울 때만 교체하므로 동률은 작은 값 유지
        if (candidate as f64 - duration).abs() < (best as f64 - duration).abs() {
            best = candidate;
        }
    }
    best
}

/// 기간 정규화 단계
#[derive(Debug, Default, Clone, Copy)]
pub struct DurationNormalizer;

impl RefinementStage for DurationNormalizer {
    fn kind(&self) -> StageKind {
        StageKind::DurationNormalizer
    }

    fn apply(&self, mut result: AnalysisResult, sink: &dyn DiagnosticSink) -> AnalysisResult {
        let from = result.prediction.duration;
        let to = normalize_duration(from);

        if from != to as f64 {
            sink.record(Diagnostic::new(
                self.kind(),
                DiagnosticKind::DurationNormalized { from, to },
            ));
        }

        result.prediction.duration = to as f64;
        result
    }
}
