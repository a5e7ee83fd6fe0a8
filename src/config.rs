use crate::config_loader::{ConfigError, ConfigResult, ConfigValidation};
use crate::model::{Bias, Trend};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// 기본 플래그 추론 키워드 테이블
pub static DEFAULT_FLAG_KEYWORDS: Lazy<FlagKeywords> = Lazy::new(|| FlagKeywords {
    breakout_in_name: to_strings(&["breakout"]),
    breakout_in_description: to_strings(&["breaking", "breakout"]),
    reversal_in_name: to_strings(&[
        "reversal",
        "engulfing",
        "hammer",
        "doji",
        "star",
        "bottom",
        "top",
    ]),
});

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// 모멘텀 임계값
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MomentumThresholds {
    /// 과매도 경계 (이 값 이하면 과매도)
    pub oversold: f64,
    /// 과매도 근접 보정 상한 (oversold 초과 ~ 이 값 미만은 oversold로 보정)
    pub near_oversold_ceiling: f64,
    /// 과매수 경계 (이 값 초과면 과매수)
    pub overbought: f64,
}

impl Default for MomentumThresholds {
    fn default() -> Self {
        MomentumThresholds {
            oversold: 30.0,
            near_oversold_ceiling: 40.0,
            overbought: 70.0,
        }
    }
}

/// 누락된 돌파/반전 플래그 추론용 키워드 테이블
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlagKeywords {
    /// 패턴 이름에서 찾는 돌파 키워드
    pub breakout_in_name: Vec<String>,
    /// 패턴 서술에서 찾는 돌파 키워드
    pub breakout_in_description: Vec<String>,
    /// 패턴 이름에서 찾는 반전 키워드
    pub reversal_in_name: Vec<String>,
}

impl Default for FlagKeywords {
    fn default() -> Self {
        DEFAULT_FLAG_KEYWORDS.clone()
    }
}

/// 보정 규칙 적용 조건
///
/// 지정된 조건이 모두 만족될 때만 규칙이 적용됩니다. 비어 있으면 항상 적용됩니다.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct RuleCondition {
    pub trend: Option<Trend>,
    pub direction: Option<Bias>,
    pub momentum_at_most: Option<f64>,
    pub momentum_at_least: Option<f64>,
    /// 패턴 이름 부분 문자열 (대소문자 무시)
    pub pattern_name_contains: Option<String>,
}

/// 보정 규칙 동작
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct RuleAction {
    /// 예측 방향 교체
    pub direction: Option<Bias>,
    /// 신뢰도 하한 (낮추지는 않음)
    pub min_confidence: Option<f64>,
    /// 추가할 근거 문자열
    pub factor: Option<String>,
}

impl RuleAction {
    fn is_empty(&self) -> bool {
        self.direction.is_none() && self.min_confidence.is_none() && self.factor.is_none()
    }
}

/// 선언적 보정 규칙 (조건 -> 보정)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CorrectionRule {
    pub name: String,
    #[serde(default)]
    pub when: RuleCondition,
    #[serde(default)]
    pub then: RuleAction,
}

/// 정제 파이프라인 설정
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RefinerConfig {
    #[serde(default)]
    pub momentum: MomentumThresholds,
    #[serde(default)]
    pub flags: FlagKeywords,
    #[serde(default)]
    pub correction_rules: Vec<CorrectionRule>,
}

impl ConfigValidation for RefinerConfig {
    fn validate(&self) -> ConfigResult<()> {
        let m = &self.momentum;
        for (label, value) in [
            ("oversold", m.oversold),
            ("near_oversold_ceiling", m.near_oversold_ceiling),
            ("overbought", m.overbought),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{} 값({})은 0~100 범위여야 합니다",
                    label, value
                )));
            }
        }

        if m.oversold >= m.near_oversold_ceiling {
            return Err(ConfigError::ValidationError(format!(
                "과매도 경계({})는 보정 상한({})보다 작아야 합니다",
                m.oversold, m.near_oversold_ceiling
            )));
        }

        if m.oversold >= m.overbought {
            return Err(ConfigError::ValidationError(format!(
                "과매도 경계({})는 과매수 경계({})보다 작아야 합니다",
                m.oversold, m.overbought
            )));
        }

        let flags = &self.flags;
        if flags.breakout_in_name.is_empty()
            || flags.breakout_in_description.is_empty()
            || flags.reversal_in_name.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "플래그 키워드 목록은 비어 있을 수 없습니다".to_string(),
            ));
        }

        for rule in &self.correction_rules {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "보정 규칙 이름이 비어 있습니다".to_string(),
                ));
            }
            if rule.then.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "보정 규칙 '{}'에 동작이 없습니다",
                    rule.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RefinerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.momentum.oversold, 30.0);
        assert!(config.flags.reversal_in_name.contains(&"doji".to_string()));
        assert!(config.correction_rules.is_empty());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = RefinerConfig::default();
        config.momentum.near_oversold_ceiling = 25.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_rule_without_action_rejected() {
        let mut config = RefinerConfig::default();
        config.correction_rules.push(CorrectionRule {
            name: "noop".to_string(),
            when: RuleCondition::default(),
            then: RuleAction::default(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_keyword_table_rejected() {
        let mut config = RefinerConfig::default();
        config.flags.breakout_in_description.clear();
        assert!(config.validate().is_err());
    }
}
