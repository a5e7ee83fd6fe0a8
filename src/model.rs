use crate::config::MomentumThresholds;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 패턴 중요도
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Significance {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Significance::High => write!(f, "high"),
            Significance::Medium => write!(f, "medium"),
            Significance::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Significance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Significance::High),
            "medium" => Ok(Significance::Medium),
            "low" => Ok(Significance::Low),
            _ => Err(format!("알 수 없는 중요도: {}", s)),
        }
    }
}

impl TryFrom<String> for Significance {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 방향성
///
/// 패턴의 함의(implication)와 예측 방향(direction)에 공통으로 사용됩니다.
/// 상류 모델이 종종 `natural`로 잘못 표기하므로 중립으로 받아들입니다.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Bias {
    /// 상승
    Bullish,
    /// 하락
    Bearish,
    /// 중립
    #[default]
    Neutral,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Bullish => write!(f, "bullish"),
            Bias::Bearish => write!(f, "bearish"),
            Bias::Neutral => write!(f, "neutral"),
        }
    }
}

impl FromStr for Bias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bullish" => Ok(Bias::Bullish),
            "bearish" => Ok(Bias::Bearish),
            "neutral" | "natural" => Ok(Bias::Neutral),
            _ => Err(format!("알 수 없는 방향: {}", s)),
        }
    }
}

impl TryFrom<String> for Bias {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 거래량 추세
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl fmt::Display for VolumeTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeTrend::Increasing => write!(f, "increasing"),
            VolumeTrend::Decreasing => write!(f, "decreasing"),
            VolumeTrend::Stable => write!(f, "stable"),
        }
    }
}

impl FromStr for VolumeTrend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "increasing" => Ok(VolumeTrend::Increasing),
            "decreasing" => Ok(VolumeTrend::Decreasing),
            "stable" => Ok(VolumeTrend::Stable),
            _ => Err(format!("알 수 없는 거래량 추세: {}", s)),
        }
    }
}

impl TryFrom<String> for VolumeTrend {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 최근 5~10개 캔들 기준의 단기 추세
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String")]
pub enum Trend {
    /// 상승 추세
    Uptrend,
    /// 하락 추세
    Downtrend,
    /// 횡보
    Sideways,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Uptrend => write!(f, "Uptrend"),
            Trend::Downtrend => write!(f, "Downtrend"),
            Trend::Sideways => write!(f, "Sideways"),
        }
    }
}

impl FromStr for Trend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "UPTREND" | "UP" => Ok(Trend::Uptrend),
            "DOWNTREND" | "DOWN" => Ok(Trend::Downtrend),
            "SIDEWAYS" | "RANGING" => Ok(Trend::Sideways),
            _ => Err(format!("알 수 없는 추세: {}", s)),
        }
    }
}

impl TryFrom<String> for Trend {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 신호 강도
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Strength {
    Strong,
    #[default]
    Moderate,
    Weak,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strength::Strong => write!(f, "strong"),
            Strength::Moderate => write!(f, "moderate"),
            Strength::Weak => write!(f, "weak"),
        }
    }
}

impl FromStr for Strength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strong" => Ok(Strength::Strong),
            "moderate" => Ok(Strength::Moderate),
            "weak" => Ok(Strength::Weak),
            _ => Err(format!("알 수 없는 신호 강도: {}", s)),
        }
    }
}

impl TryFrom<String> for Strength {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 감지된 차트 패턴 하나
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    /// 패턴 이름 (예: "Bullish Engulfing")
    #[serde(alias = "pattern")]
    pub name: String,
    #[serde(default)]
    pub significance: Significance,
    #[serde(default)]
    pub implication: Bias,
    /// 자유 서술. 후속 휴리스틱에서 약한 근거로 사용됩니다.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_breakout: bool,
    #[serde(default)]
    pub is_reversal: bool,
}

impl Pattern {
    /// 새 패턴 생성 (플래그는 모두 false)
    pub fn new(
        name: impl Into<String>,
        significance: Significance,
        implication: Bias,
        description: impl Into<String>,
    ) -> Self {
        Pattern {
            name: name.into(),
            significance,
            implication,
            description: description.into(),
            is_breakout: false,
            is_reversal: false,
        }
    }

    /// 돌파 플래그 설정
    pub fn with_breakout(mut self, is_breakout: bool) -> Self {
        self.is_breakout = is_breakout;
        self
    }

    /// 반전 플래그 설정
    pub fn with_reversal(mut self, is_reversal: bool) -> Self {
        self.is_reversal = is_reversal;
        self
    }

    /// 이름에 키워드가 포함되는지 확인 (대소문자 무시)
    pub fn name_mentions(&self, keyword: &str) -> bool {
        self.name.to_lowercase().contains(&keyword.to_lowercase())
    }

    /// 서술에 키워드가 포함되는지 확인 (대소문자 무시)
    pub fn description_mentions(&self, keyword: &str) -> bool {
        self.description
            .to_lowercase()
            .contains(&keyword.to_lowercase())
    }

    /// 레인징/박스권 돌파 패턴인지 확인
    pub fn is_ranging_formation(&self) -> bool {
        self.name_mentions("ranging") || self.name_mentions("range breakout")
    }

    /// 모멘텀 과매도 상태를 나타내는 패턴인지 확인
    pub fn signals_oversold_momentum(&self) -> bool {
        self.name_mentions("oversold") && (self.name_mentions("momentum") || self.name_mentions("rsi"))
    }

    /// 반전 그룹으로 분류되는지 확인 (표시 계층의 그룹 분류용)
    pub fn is_reversal_like(&self) -> bool {
        self.is_reversal
            || ["reversal", "engulfing", "hammer", "doji", "star"]
                .iter()
                .any(|keyword| self.name_mentions(keyword))
    }

    /// 돌파 그룹으로 분류되는지 확인 (표시 계층의 그룹 분류용)
    pub fn is_breakout_like(&self) -> bool {
        self.is_breakout
            || self.name_mentions("break")
            || self.description_mentions("breaking")
            || self.description_mentions("breakout")
    }
}

/// 분석 구간의 지표 스냅샷
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Indicators {
    /// 오실레이터 값 (관례상 0~100)
    #[serde(alias = "rsi")]
    pub momentum: f64,
    #[serde(default)]
    pub volume: VolumeTrend,
    pub trend: Trend,
    /// 빠른 이동평균 대비 가격 위치
    #[serde(default, alias = "ema9Position")]
    pub ma_fast_position: String,
    /// 느린 이동평균 대비 가격 위치
    #[serde(default, alias = "ema21Position")]
    pub ma_slow_position: String,
    #[serde(default)]
    pub support: f64,
    #[serde(default)]
    pub resistance: f64,
    /// 감지 순서대로의 패턴 목록
    #[serde(default, alias = "candlestickPatterns")]
    pub patterns: Vec<Pattern>,
}

impl Indicators {
    /// 임계값 기준 모멘텀 구간
    pub fn momentum_zone(&self, thresholds: &MomentumThresholds) -> MomentumZone {
        MomentumZone::classify(self.momentum, thresholds)
    }

    /// 지지선이 저항선보다 높은지 확인 (상류에서 강제되지 않음)
    pub fn has_inverted_levels(&self) -> bool {
        self.support > self.resistance
    }
}

/// 향후 방향 예측
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub direction: Bias,
    /// 권장 거래 기간(분). 정규화 이후에는 항상 1, 2, 5 중 하나입니다.
    #[serde(serialize_with = "serialize_minutes")]
    pub duration: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub strength: Strength,
    /// 사람이 읽는 근거 목록 (추가만 허용)
    #[serde(default)]
    pub factors: Vec<String>,
}

impl Prediction {
    /// 정수 분 단위 기간
    pub fn duration_minutes(&self) -> u32 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration.round() as u32
        } else {
            0
        }
    }

    /// 신뢰도 구간
    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::classify(self.confidence)
    }

    /// 근거 중 키워드를 언급하는 항목이 있는지 확인 (대소문자 무시)
    pub fn has_factor_mentioning(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.factors
            .iter()
            .any(|factor| factor.to_lowercase().contains(&keyword))
    }
}

/// 파이프라인을 통과하는 단위 레코드
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub indicators: Indicators,
    pub prediction: Prediction,
}

/// 모멘텀 구간
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentumZone {
    /// 과매도 (임계값 이하)
    Oversold,
    Neutral,
    /// 과매수 (임계값 초과)
    Overbought,
}

impl MomentumZone {
    /// 임계값으로 모멘텀 값 분류
    ///
    /// 과매도는 임계값에 닿거나 내려간 경우까지 포함합니다.
    pub fn classify(momentum: f64, thresholds: &MomentumThresholds) -> MomentumZone {
        if momentum <= thresholds.oversold {
            MomentumZone::Oversold
        } else if momentum > thresholds.overbought {
            MomentumZone::Overbought
        } else {
            MomentumZone::Neutral
        }
    }
}

impl fmt::Display for MomentumZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomentumZone::Oversold => write!(f, "Oversold"),
            MomentumZone::Neutral => write!(f, "Neutral"),
            MomentumZone::Overbought => write!(f, "Overbought"),
        }
    }
}

/// 예측 신뢰도 구간
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn classify(confidence: f64) -> ConfidenceBand {
        if confidence > 75.0 {
            ConfidenceBand::High
        } else if confidence > 50.0 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

// 정규화된 기간은 정수로 내보냄
fn serialize_minutes<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bias_accepts_natural_alias() {
        let bias: Bias = serde_json::from_value(json!("natural")).unwrap();
        assert_eq!(bias, Bias::Neutral);
        assert_eq!(serde_json::to_value(bias).unwrap(), json!("neutral"));
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("Bullish".parse::<Bias>().unwrap(), Bias::Bullish);
        assert_eq!("uptrend".parse::<Trend>().unwrap(), Trend::Uptrend);
        assert_eq!("HIGH".parse::<Significance>().unwrap(), Significance::High);
        assert!("sideways-ish".parse::<Trend>().is_err());
    }

    #[test]
    fn test_trend_serializes_with_capital_name() {
        assert_eq!(serde_json::to_value(Trend::Sideways).unwrap(), json!("Sideways"));
    }

    #[test]
    fn test_pattern_accepts_producer_field_names() {
        let pattern: Pattern = serde_json::from_value(json!({
            "pattern": "Doji",
            "significance": "low",
            "implication": "neutral",
            "description": "indecision"
        }))
        .unwrap();

        assert_eq!(pattern.name, "Doji");
        assert!(!pattern.is_breakout);
        assert!(!pattern.is_reversal);

        let value = serde_json::to_value(&pattern).unwrap();
        assert_eq!(value["name"], json!("Doji"));
        assert_eq!(value["isReversal"], json!(false));
    }

    #[test]
    fn test_duration_serializes_as_integer() {
        let prediction = Prediction {
            direction: Bias::Bullish,
            duration: 2.0,
            confidence: 60.0,
            strength: Strength::Moderate,
            factors: vec![],
        };
        let value = serde_json::to_value(&prediction).unwrap();
        assert_eq!(value["duration"], json!(2));
        assert_eq!(prediction.duration_minutes(), 2);
    }

    #[test]
    fn test_momentum_zone_boundaries() {
        let thresholds = MomentumThresholds::default();
        assert_eq!(MomentumZone::classify(30.0, &thresholds), MomentumZone::Oversold);
        assert_eq!(MomentumZone::classify(30.1, &thresholds), MomentumZone::Neutral);
        assert_eq!(MomentumZone::classify(70.0, &thresholds), MomentumZone::Neutral);
        assert_eq!(MomentumZone::classify(70.5, &thresholds), MomentumZone::Overbought);
    }

    #[test]
    fn test_momentum_zone_uses_configured_thresholds() {
        let indicators = Indicators {
            momentum: 33.0,
            volume: VolumeTrend::Stable,
            trend: Trend::Sideways,
            ma_fast_position: String::new(),
            ma_slow_position: String::new(),
            support: 0.0,
            resistance: 0.0,
            patterns: vec![],
        };
        let custom = MomentumThresholds {
            oversold: 35.0,
            near_oversold_ceiling: 45.0,
            overbought: 65.0,
        };
        assert_eq!(
            indicators.momentum_zone(&MomentumThresholds::default()),
            MomentumZone::Neutral
        );
        assert_eq!(indicators.momentum_zone(&custom), MomentumZone::Oversold);
    }

    #[test]
    fn test_confidence_band() {
        assert_eq!(ConfidenceBand::classify(80.0), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::classify(75.0), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::classify(50.0), ConfidenceBand::Low);
    }

    #[test]
    fn test_pattern_grouping() {
        let star = Pattern::new("Evening Star", Significance::High, Bias::Bearish, "");
        assert!(star.is_reversal_like());
        assert!(!star.is_breakout_like());

        let push = Pattern::new(
            "Momentum Push",
            Significance::Medium,
            Bias::Bullish,
            "price breaking above the range",
        );
        assert!(push.is_breakout_like());
        assert!(!push.is_reversal_like());
    }

    #[test]
    fn test_oversold_signal_detection() {
        let rsi = Pattern::new("RSI Oversold Signal", Significance::High, Bias::Bullish, "");
        let momentum = Pattern::new("Momentum Oversold Signal", Significance::High, Bias::Bullish, "");
        let other = Pattern::new("Oversold Bounce", Significance::High, Bias::Bullish, "");
        assert!(rsi.signals_oversold_momentum());
        assert!(momentum.signals_oversold_momentum());
        assert!(!other.signals_oversold_momentum());
    }
}
