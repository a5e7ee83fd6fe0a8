use super::{BEARISH_RANGING_REVERSAL, BULLISH_RANGING_REVERSAL, RefinementStage};
use crate::config::{CorrectionRule, MomentumThresholds, RuleCondition};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, StageKind};
use crate::model::{AnalysisResult, Bias, Indicators, Pattern, Prediction, Significance};
use log::debug;

/// 과매도 반등 근거 문자열
pub fn oversold_bounce_factor(oversold: f64) -> String {
    format!(
        "Momentum is in oversold territory (at or below {}), suggesting a potential bounce",
        oversold
    )
}

const RANGE_CUES: [&str; 2] = ["consolidation", "range"];
const BREAK_CUES: [&str; 2] = ["breaking", "breakout"];
const UPSIDE_CUES: [&str; 3] = ["upward", "bullish", "higher"];

/// 신호 보강 단계
///
/// 검증된 패턴 집합에서 잠재 복합 패턴을 추론하고, 예측 근거를 덧붙입니다.
/// 근거 목록은 추가만 하며 기존 항목을 지우거나 재정렬하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct SignalEnhancer {
    thresholds: MomentumThresholds,
    rules: Vec<CorrectionRule>,
}

impl SignalEnhancer {
    pub fn new(thresholds: MomentumThresholds, rules: Vec<CorrectionRule>) -> Self {
        SignalEnhancer { thresholds, rules }
    }

    /// 분석 결과 보강
    pub fn enhance(&self, result: AnalysisResult, sink: &dyn DiagnosticSink) -> AnalysisResult {
        let AnalysisResult {
            indicators,
            prediction,
        } = result;

        let latent = Self::latent_ranging_reversal(&indicators.patterns);
        if let Some(pattern) = &latent {
            sink.record(Diagnostic::new(
                StageKind::SignalEnhancer,
                DiagnosticKind::PatternSynthesized {
                    name: pattern.name.clone(),
                },
            ));
        }
        let indicators = Indicators {
            patterns: indicators.patterns.into_iter().chain(latent).collect(),
            ..indicators
        };

        let prediction = self.apply_correction_rules(&indicators, prediction, sink);
        let prediction = self.propagate_oversold_factor(&indicators, prediction, sink);

        AnalysisResult {
            indicators,
            prediction,
        }
    }

    /// 서술에 박스권 + 돌파 단서가 있으나 레인징 패턴이 없으면 합성
    fn latent_ranging_reversal(patterns: &[Pattern]) -> Option<Pattern> {
        if patterns.iter().any(Pattern::is_ranging_formation) {
            return None;
        }

        let text = patterns
            .iter()
            .map(|p| p.description.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let mentions = |cues: &[&str]| cues.iter().any(|cue| text.contains(cue));

        if !(mentions(&RANGE_CUES[..]) && mentions(&BREAK_CUES[..])) {
            return None;
        }

        let pattern = if mentions(&UPSIDE_CUES[..]) {
            Pattern::new(
                BULLISH_RANGING_REVERSAL,
                Significance::High,
                Bias::Bullish,
                "Price has been consolidating in a range and is now breaking out upward, suggesting a bullish reversal.",
            )
        } else {
            Pattern::new(
                BEARISH_RANGING_REVERSAL,
                Significance::High,
                Bias::Bearish,
                "Price has been consolidating in a range and is now breaking out downward, suggesting a bearish continuation.",
            )
        };

        Some(pattern.with_breakout(true).with_reversal(true))
    }

    /// 과매도 + 상승 예측이면 반등 근거 추가
    fn propagate_oversold_factor(
        &self,
        indicators: &Indicators,
        prediction: Prediction,
        sink: &dyn DiagnosticSink,
    ) -> Prediction {
        if indicators.momentum > self.thresholds.oversold
            || prediction.direction != Bias::Bullish
            || prediction.has_factor_mentioning("oversold")
        {
            return prediction;
        }

        append_factor(prediction, oversold_bounce_factor(self.thresholds.oversold), sink)
    }

    /// 선언적 보정 규칙 적용 (테이블 순서)
    fn apply_correction_rules(
        &self,
        indicators: &Indicators,
        prediction: Prediction,
        sink: &dyn DiagnosticSink,
    ) -> Prediction {
        self.rules.iter().fold(prediction, |prediction, rule| {
            if !condition_holds(&rule.when, indicators, &prediction) {
                return prediction;
            }

            debug!("보정 규칙 일치: {}", rule.name);
            sink.record(Diagnostic::new(
                StageKind::SignalEnhancer,
                DiagnosticKind::CorrectionRuleApplied {
                    rule: rule.name.clone(),
                },
            ));

            let action = &rule.then;
            let prediction = Prediction {
                direction: action.direction.unwrap_or(prediction.direction),
                confidence: action
                    .min_confidence
                    .map_or(prediction.confidence, |floor| prediction.confidence.max(floor)),
                ..prediction
            };

            match &action.factor {
                Some(factor)
                    if !prediction
                        .factors
                        .iter()
                        .any(|existing| existing.eq_ignore_ascii_case(factor)) =>
                {
                    append_factor(prediction, factor.clone(), sink)
                }
                _ => prediction,
            }
        })
    }
}

fn condition_holds(when: &RuleCondition, indicators: &Indicators, prediction: &Prediction) -> bool {
    when.trend.is_none_or(|trend| indicators.trend == trend)
        && when
            .direction
            .is_none_or(|direction| prediction.direction == direction)
        && when
            .momentum_at_most
            .is_none_or(|limit| indicators.momentum <= limit)
        && when
            .momentum_at_least
            .is_none_or(|limit| indicators.momentum >= limit)
        && when.pattern_name_contains.as_deref().is_none_or(|needle| {
            indicators
                .patterns
                .iter()
                .any(|pattern| pattern.name_mentions(needle))
        })
}

fn append_factor(prediction: Prediction, factor: String, sink: &dyn DiagnosticSink) -> Prediction {
    sink.record(Diagnostic::new(
        StageKind::SignalEnhancer,
        DiagnosticKind::FactorAppended {
            factor: factor.clone(),
        },
    ));
    Prediction {
        factors: prediction
            .factors
            .into_iter()
            .chain(std::iter::once(factor))
            .collect(),
        ..prediction
    }
}

impl RefinementStage for SignalEnhancer {
    fn kind(&self) -> StageKind {
        StageKind::SignalEnhancer
    }

    fn apply(&self, result: AnalysisResult, sink: &dyn DiagnosticSink) -> AnalysisResult {
        self.enhance(result, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleAction;
    use crate::diagnostics::{NoopSink, RecordingSink};
    use crate::model::{Strength, Trend, VolumeTrend};

    fn result(momentum: f64, direction: Bias, patterns: Vec<Pattern>, factors: &[&str]) -> AnalysisResult {
        AnalysisResult {
            indicators: Indicators {
                momentum,
                volume: VolumeTrend::Increasing,
                trend: Trend::Sideways,
                ma_fast_position: "above".to_string(),
                ma_slow_position: "above".to_string(),
                support: 10.0,
                resistance: 12.0,
                patterns,
            },
            prediction: Prediction {
                direction,
                duration: 2.0,
                confidence: 60.0,
                strength: Strength::Moderate,
                factors: factors.iter().map(|f| f.to_string()).collect(),
            },
        }
    }

    fn described(description: &str) -> Pattern {
        Pattern::new("Marubozu", Significance::Medium, Bias::Neutral, description)
    }

    #[test]
    fn test_latent_bullish_ranging_reversal() {
        let enhancer = SignalEnhancer::default();
        let out = enhancer.enhance(
            result(
                50.0,
                Bias::Neutral,
                vec![
                    described("price held in consolidation for hours"),
                    described("now breaking higher with volume"),
                ],
                &[],
            ),
            &NoopSink,
        );
        let added = out.indicators.patterns.last().unwrap();
        assert_eq!(out.indicators.patterns.len(), 3);
        assert_eq!(added.name, BULLISH_RANGING_REVERSAL);
        assert_eq!(added.implication, Bias::Bullish);
        assert!(added.is_breakout && added.is_reversal);
        assert_eq!(added.significance, Significance::High);
    }

    #[test]
    fn test_latent_bearish_ranging_reversal() {
        let enhancer = SignalEnhancer::default();
        let out = enhancer.enhance(
            result(50.0, Bias::Bearish, vec![described("range breakout to the downside")], &[]),
            &NoopSink,
        );
        let added = out.indicators.patterns.last().unwrap();
        assert_eq!(added.name, BEARISH_RANGING_REVERSAL);
        assert_eq!(added.implication, Bias::Bearish);
    }

    #[test]
    fn test_no_inference_when_ranging_pattern_exists() {
        let enhancer = SignalEnhancer::default();
        let existing = Pattern::new(
            "Range Breakout",
            Significance::High,
            Bias::Bullish,
            "consolidation then breakout",
        );
        let out = enhancer.enhance(result(50.0, Bias::Bullish, vec![existing], &[]), &NoopSink);
        assert_eq!(out.indicators.patterns.len(), 1);
    }

    #[test]
    fn test_no_inference_without_both_cues() {
        let enhancer = SignalEnhancer::default();
        let out = enhancer.enhance(
            result(50.0, Bias::Bullish, vec![described("tight consolidation")], &[]),
            &NoopSink,
        );
        assert_eq!(out.indicators.patterns.len(), 1);
    }

    #[test]
    fn test_oversold_factor_appended_for_bullish() {
        let enhancer = SignalEnhancer::default();
        let out = enhancer.enhance(result(30.0, Bias::Bullish, vec![], &["first", "second"]), &NoopSink);
        assert_eq!(
            out.prediction.factors,
            vec![
                "first".to_string(),
                "second".to_string(),
                oversold_bounce_factor(30.0)
            ]
        );
    }

    #[test]
    fn test_oversold_factor_skipped() {
        let enhancer = SignalEnhancer::default();

        let out = enhancer.enhance(result(25.0, Bias::Bearish, vec![], &[]), &NoopSink);
        assert!(out.prediction.factors.is_empty());

        let out = enhancer.enhance(result(45.0, Bias::Bullish, vec![], &[]), &NoopSink);
        assert!(out.prediction.factors.is_empty());

        let out = enhancer.enhance(
            result(25.0, Bias::Bullish, vec![], &["RSI Oversold near 30"]),
            &NoopSink,
        );
        assert_eq!(out.prediction.factors.len(), 1);
    }

    #[test]
    fn test_correction_rule_applies() {
        let rule = CorrectionRule {
            name: "sideways-oversold-bounce".to_string(),
            when: RuleCondition {
                trend: Some(Trend::Sideways),
                momentum_at_most: Some(30.0),
                ..RuleCondition::default()
            },
            then: RuleAction {
                direction: Some(Bias::Bullish),
                min_confidence: Some(65.0),
                factor: Some("Sideways market resting on the range floor".to_string()),
            },
        };
        let enhancer = SignalEnhancer::new(MomentumThresholds::default(), vec![rule]);
        let sink = RecordingSink::new();
        let out = enhancer.enhance(result(28.0, Bias::Neutral, vec![], &["kept"]), &sink);

        assert_eq!(out.prediction.direction, Bias::Bullish);
        assert_eq!(out.prediction.confidence, 65.0);
        // 규칙이 방향을 바꾼 뒤 과매도 근거도 추가됨
        assert_eq!(
            out.prediction.factors,
            vec![
                "kept".to_string(),
                "Sideways market resting on the range floor".to_string(),
                oversold_bounce_factor(30.0),
            ]
        );
        assert!(sink.kinds().contains(&DiagnosticKind::CorrectionRuleApplied {
            rule: "sideways-oversold-bounce".to_string()
        }));
    }

    #[test]
    fn test_correction_rule_never_lowers_confidence() {
        let rule = CorrectionRule {
            name: "floor".to_string(),
            when: RuleCondition {
                pattern_name_contains: Some("marubozu".to_string()),
                ..RuleCondition::default()
            },
            then: RuleAction {
                min_confidence: Some(40.0),
                ..RuleAction::default()
            },
        };
        let enhancer = SignalEnhancer::new(MomentumThresholds::default(), vec![rule]);
        let out = enhancer.enhance(result(50.0, Bias::Bearish, vec![described("")], &[]), &NoopSink);
        assert_eq!(out.prediction.confidence, 60.0);
    }

    #[test]
    fn test_correction_rule_not_matching() {
        let rule = CorrectionRule {
            name: "uptrend-only".to_string(),
            when: RuleCondition {
                trend: Some(Trend::Uptrend),
                ..RuleCondition::default()
            },
            then: RuleAction {
                direction: Some(Bias::Bearish),
                ..RuleAction::default()
            },
        };
        let enhancer = SignalEnhancer::new(MomentumThresholds::default(), vec![rule]);
        let out = enhancer.enhance(result(50.0, Bias::Bullish, vec![], &[]), &NoopSink);
        assert_eq!(out.prediction.direction, Bias::Bullish);
    }

    #[test]
    fn test_factors_are_append_only() {
        let enhancer = SignalEnhancer::default();
        let input = result(20.0, Bias::Bullish, vec![described("range then breakout upward")], &["b", "a"]);
        let before = input.prediction.factors.clone();
        let out = enhancer.enhance(input, &NoopSink);
        assert!(out.prediction.factors.len() >= before.len());
        assert_eq!(&out.prediction.factors[..before.len()], &before[..]);
    }
}
