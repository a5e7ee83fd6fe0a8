use super::{BULLISH_RANGING_REVERSAL, MOMENTUM_OVERSOLD_SIGNAL, RefinementStage};
use crate::config::MomentumThresholds;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, StageKind};
use crate::model::{AnalysisResult, Bias, Indicators, Pattern, Significance, Trend};
use std::fmt;

/// 상승 캔들 색상 단서
const BULLISH_CANDLE_CUES: [&str; 1] = ["green candle"];

/// 검증 규칙이 적용되는 패턴 계열
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFamily {
    BearishEngulfing,
    BullishEngulfing,
    Ranging,
    Hammer,
    ShootingStar,
    Doji,
    DoubleBottom,
    DoubleTop,
}

impl fmt::Display for PatternFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternFamily::BearishEngulfing => write!(f, "bearish engulfing"),
            PatternFamily::BullishEngulfing => write!(f, "bullish engulfing"),
            PatternFamily::Ranging => write!(f, "ranging"),
            PatternFamily::Hammer => write!(f, "hammer"),
            PatternFamily::ShootingStar => write!(f, "shooting star"),
            PatternFamily::Doji => write!(f, "doji"),
            PatternFamily::DoubleBottom => write!(f, "double bottom"),
            PatternFamily::DoubleTop => write!(f, "double top"),
        }
    }
}

/// 패턴이 유효한 추세 컨텍스트
#[derive(Debug, Clone, Copy)]
enum TrendGate {
    /// 항상 유효
    Any,
    /// 해당 추세에서만 유효. 이름에 예외 키워드가 있으면 추세와 무관하게 유효
    Requires {
        trend: Trend,
        unless_name_mentions: &'static str,
    },
    /// 해당 추세에서는 무효
    Forbids(Trend),
}

impl TrendGate {
    fn admits(&self, trend: Trend, lower_name: &str) -> bool {
        match *self {
            TrendGate::Any => true,
            TrendGate::Requires {
                trend: required,
                unless_name_mentions,
            } => trend == required || lower_name.contains(unless_name_mentions),
            TrendGate::Forbids(forbidden) => trend != forbidden,
        }
    }
}

/// 함의 보정 방식
#[derive(Debug, Clone, Copy)]
enum ImplicationPolicy {
    /// 지정된 방향으로 강제
    Force(Bias),
    /// 이름/서술의 방향 단어로 추론, 없으면 유지
    FromWording,
    /// 유지
    Keep,
}

/// 패턴 계열별 검증 규칙
struct FamilyRule {
    family: PatternFamily,
    keywords: &'static [&'static str],
    gate: TrendGate,
    implication: ImplicationPolicy,
    marks_reversal: bool,
}

/// 계열 규칙 테이블 (나열 순서대로 평가)
static FAMILY_RULES: [FamilyRule; 8] = [
    FamilyRule {
        family: PatternFamily::BearishEngulfing,
        keywords: &["bearish engulfing"],
        gate: TrendGate::Requires {
            trend: Trend::Uptrend,
            unless_name_mentions: "resistance",
        },
        implication: ImplicationPolicy::Force(Bias::Bearish),
        marks_reversal: false,
    },
    FamilyRule {
        family: PatternFamily::BullishEngulfing,
        keywords: &["bullish engulfing"],
        gate: TrendGate::Requires {
            trend: Trend::Downtrend,
            unless_name_mentions: "support",
        },
        implication: ImplicationPolicy::Force(Bias::Bullish),
        marks_reversal: false,
    },
    FamilyRule {
        family: PatternFamily::Ranging,
        keywords: &["ranging", "range breakout"],
        gate: TrendGate::Any,
        implication: ImplicationPolicy::FromWording,
        marks_reversal: true,
    },
    FamilyRule {
        family: PatternFamily::Hammer,
        keywords: &["hammer"],
        gate: TrendGate::Forbids(Trend::Uptrend),
        implication: ImplicationPolicy::Force(Bias::Bullish),
        marks_reversal: true,
    },
    FamilyRule {
        family: PatternFamily::ShootingStar,
        keywords: &["shooting star"],
        gate: TrendGate::Forbids(Trend::Downtrend),
        implication: ImplicationPolicy::Force(Bias::Bearish),
        marks_reversal: true,
    },
    FamilyRule {
        family: PatternFamily::Doji,
        keywords: &["doji"],
        gate: TrendGate::Any,
        implication: ImplicationPolicy::Keep,
        marks_reversal: true,
    },
    FamilyRule {
        family: PatternFamily::DoubleBottom,
        keywords: &["double bottom"],
        gate: TrendGate::Any,
        implication: ImplicationPolicy::Force(Bias::Bullish),
        marks_reversal: true,
    },
    FamilyRule {
        family: PatternFamily::DoubleTop,
        keywords: &["double top"],
        gate: TrendGate::Any,
        implication: ImplicationPolicy::Force(Bias::Bearish),
        marks_reversal: true,
    },
];

/// 이름/서술의 방향 단어로 함의 추론
fn implication_from_wording(pattern: &Pattern) -> Option<Bias> {
    let text = format!("{} {}", pattern.name, pattern.description).to_lowercase();
    if text.contains("bullish") || text.contains("upward") {
        Some(Bias::Bullish)
    } else if text.contains("bearish") || text.contains("downward") {
        Some(Bias::Bearish)
    } else {
        None
    }
}

/// 소문자 이름에 일치하는 계열 규칙 (테이블 순서)
fn matching_rules(lower_name: &str) -> impl Iterator<Item = &'static FamilyRule> + '_ {
    FAMILY_RULES
        .iter()
        .filter(move |rule| rule.keywords.iter().any(|keyword| lower_name.contains(keyword)))
}

/// 패턴 계열 식별 (일치하는 모든 계열, 테이블 순서)
pub fn matching_families(name: &str) -> Vec<PatternFamily> {
    matching_rules(&name.to_lowercase())
        .map(|rule| rule.family)
        .collect()
}

/// 일관성 검증 단계
///
/// 패턴/추세/모멘텀 사이의 도메인 불변식을 강제합니다. 각 패턴은 독립적으로 검증되며,
/// 결과 집합은 새로 구성됩니다 (filter 후 map).
#[derive(Debug, Clone, Default)]
pub struct ConsistencyValidator {
    thresholds: MomentumThresholds,
}

impl ConsistencyValidator {
    pub fn new(thresholds: MomentumThresholds) -> Self {
        ConsistencyValidator { thresholds }
    }

    /// 지표 검증
    ///
    /// # Arguments
    /// * `indicators` - 검증할 지표 (소유권 이전)
    /// * `sink` - 진단 이벤트 싱크
    ///
    /// # Returns
    /// * `Indicators` - 패턴이 걸러지고 보정된 새 지표
    pub fn validate(&self, indicators: Indicators, sink: &dyn DiagnosticSink) -> Indicators {
        let Indicators {
            momentum,
            trend,
            patterns,
            ..
        } = indicators;
        let momentum = self.correct_momentum(momentum, sink);

        let mut verified: Vec<Pattern> = patterns
            .into_iter()
            .filter_map(|pattern| self.verify_pattern(pattern, trend, sink))
            .collect();

        if let Some(signal) = self.oversold_signal(momentum, &verified) {
            sink.record(Diagnostic::new(
                StageKind::ConsistencyValidator,
                DiagnosticKind::PatternSynthesized {
                    name: signal.name.clone(),
                },
            ));
            verified.push(signal);
        }

        Indicators {
            momentum,
            patterns: verified,
            ..indicators
        }
    }

    /// 과매도 근접 값을 과매도 경계로 보정
    fn correct_momentum(&self, momentum: f64, sink: &dyn DiagnosticSink) -> f64 {
        let t = &self.thresholds;
        if momentum > t.oversold && momentum < t.near_oversold_ceiling {
            sink.record(Diagnostic::new(
                StageKind::ConsistencyValidator,
                DiagnosticKind::MomentumClamped {
                    from: momentum,
                    to: t.oversold,
                },
            ));
            t.oversold
        } else {
            momentum
        }
    }

    /// 단일 패턴 검증. 제거 대상이면 None
    fn verify_pattern(
        &self,
        pattern: Pattern,
        trend: Trend,
        sink: &dyn DiagnosticSink,
    ) -> Option<Pattern> {
        // 횡보 중 상승 캔들 단서는 패턴 고유 계열보다 우선
        if trend == Trend::Sideways
            && BULLISH_CANDLE_CUES
                .iter()
                .any(|cue| pattern.description_mentions(cue))
        {
            return Some(Self::reclassify_as_ranging_reversal(pattern, sink));
        }

        let lower_name = pattern.name.to_lowercase();
        let mut pattern = pattern;

        for rule in matching_rules(&lower_name) {
            if !rule.gate.admits(trend, &lower_name) {
                sink.record(Diagnostic::new(
                    StageKind::ConsistencyValidator,
                    DiagnosticKind::PatternDropped {
                        name: pattern.name,
                        reason: format!("{} 패턴이 {} 추세와 맞지 않음", rule.family, trend),
                    },
                ));
                return None;
            }

            let implication = match rule.implication {
                ImplicationPolicy::Force(bias) => Some(bias),
                ImplicationPolicy::FromWording => implication_from_wording(&pattern),
                ImplicationPolicy::Keep => None,
            };
            if let Some(bias) = implication {
                pattern = Self::set_implication(pattern, bias, sink);
            }
            if rule.marks_reversal {
                pattern.is_reversal = true;
            }
        }

        Some(pattern)
    }

    fn set_implication(pattern: Pattern, bias: Bias, sink: &dyn DiagnosticSink) -> Pattern {
        if pattern.implication != bias {
            sink.record(Diagnostic::new(
                StageKind::ConsistencyValidator,
                DiagnosticKind::ImplicationCorrected {
                    name: pattern.name.clone(),
                    from: pattern.implication.to_string(),
                    to: bias.to_string(),
                },
            ));
        }
        Pattern {
            implication: bias,
            ..pattern
        }
    }

    /// 횡보 중 상승 캔들 단서가 있는 패턴을 상승 레인징 반전으로 재분류
    fn reclassify_as_ranging_reversal(pattern: Pattern, sink: &dyn DiagnosticSink) -> Pattern {
        if pattern.name != BULLISH_RANGING_REVERSAL {
            sink.record(Diagnostic::new(
                StageKind::ConsistencyValidator,
                DiagnosticKind::PatternRenamed {
                    from: pattern.name.clone(),
                    to: BULLISH_RANGING_REVERSAL.to_string(),
                },
            ));
        }
        Pattern {
            name: BULLISH_RANGING_REVERSAL.to_string(),
            implication: Bias::Bullish,
            significance: Significance::High,
            is_reversal: true,
            ..pattern
        }
    }

    /// 과매도 상태인데 해당 신호 패턴이 없으면 합성
    fn oversold_signal(&self, momentum: f64, patterns: &[Pattern]) -> Option<Pattern> {
        if momentum > self.thresholds.oversold
            || patterns.iter().any(Pattern::signals_oversold_momentum)
        {
            return None;
        }

        Some(
            Pattern::new(
                MOMENTUM_OVERSOLD_SIGNAL,
                Significance::High,
                Bias::Bullish,
                format!(
                    "Momentum has reached oversold territory ({} or below), suggesting a potential bullish reversal or bounce.",
                    self.thresholds.oversold
                ),
            )
            .with_breakout(false)
            .with_reversal(true),
        )
    }
}

impl RefinementStage for ConsistencyValidator {
    fn kind(&self) -> StageKind {
        StageKind::ConsistencyValidator
    }

    fn apply(&self, result: AnalysisResult, sink: &dyn DiagnosticSink) -> AnalysisResult {
        AnalysisResult {
            indicators: self.validate(result.indicators, sink),
            prediction: result.prediction,
        }
    }
}
