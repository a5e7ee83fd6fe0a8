// 상류 모델 응답 수집 경계
// 텍스트에서 JSON 레코드를 꺼내고, 누락 필드를 기본값/키워드 추론으로 채웁니다.

use crate::config::{DEFAULT_FLAG_KEYWORDS, FlagKeywords};
use crate::error::{AnalysisError, AnalysisOutcome};
use crate::model::{
    AnalysisResult, Bias, Indicators, Pattern, Prediction, Significance, Strength, Trend,
    VolumeTrend,
};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

const FENCE: &str = "```";
const REQUIRED_KEYS: [&str; 2] = ["indicators", "prediction"];

/// 추론된 패턴 플래그
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternFlags {
    pub is_breakout: bool,
    pub is_reversal: bool,
}

/// 키워드 테이블로 돌파/반전 플래그 추론
///
/// # Arguments
/// * `name` - 패턴 이름
/// * `description` - 패턴 서술
/// * `keywords` - 키워드 테이블
///
/// # Returns
/// * `PatternFlags` - 이름/서술 키워드 일치 결과
pub fn infer_pattern_flags(name: &str, description: &str, keywords: &FlagKeywords) -> PatternFlags {
    let name = name.to_lowercase();
    let description = description.to_lowercase();
    let matches = |text: &str, table: &[String]| {
        table
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()))
    };

    PatternFlags {
        is_breakout: matches(&name, &keywords.breakout_in_name)
            || matches(&description, &keywords.breakout_in_description),
        is_reversal: matches(&name, &keywords.reversal_in_name),
    }
}

/// 응답 텍스트에서 JSON 객체 문자열 추출
///
/// 펜스 코드 블록이 있으면 첫 번째 블록의 내용을, 없으면 첫 번째 최상위 `{...}` 구간을 반환합니다.
pub fn extract_json_block(text: &str) -> AnalysisOutcome<&str> {
    if let Some(block) = fenced_block(text) {
        debug!("펜스 코드 블록에서 JSON 추출");
        return Ok(block);
    }

    balanced_object(text).ok_or_else(|| {
        warn!("응답에서 JSON 객체를 찾지 못함");
        AnalysisError::Extraction("응답에 JSON 객체가 없습니다".to_string())
    })
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    // 언어 태그(json 등) 제거
    let body = rest[..end]
        .trim_start()
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    Some(body.trim())
}

fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// 기본 키워드 테이블로 응답 파싱
pub fn parse_response_default(text: &str) -> AnalysisOutcome<AnalysisResult> {
    parse_response(text, &DEFAULT_FLAG_KEYWORDS)
}

/// 응답 텍스트를 분석 레코드로 파싱
///
/// 구문 오류는 추출 실패, 필수 키 누락이나 타입 불일치는 구조 오류로 보고됩니다.
pub fn parse_response(text: &str, keywords: &FlagKeywords) -> AnalysisOutcome<AnalysisResult> {
    let json = extract_json_block(text)?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| AnalysisError::Extraction(format!("JSON 파싱 실패: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| AnalysisError::Structure("최상위 값이 객체가 아닙니다".to_string()))?;

    if let Some(missing) = REQUIRED_KEYS.iter().find(|key| !object.contains_key(**key)) {
        return Err(AnalysisError::Structure(format!(
            "필수 키 누락: {}",
            missing
        )));
    }

    let raw: RawAnalysis = serde_json::from_value(value)
        .map_err(|e| AnalysisError::Structure(format!("필드 형식 오류: {}", e)))?;

    Ok(raw.into_result(keywords))
}

// 선택 필드는 누락과 null을 모두 기본값으로 처리
#[derive(Deserialize)]
struct RawAnalysis {
    indicators: RawIndicators,
    prediction: RawPrediction,
}

impl RawAnalysis {
    fn into_result(self, keywords: &FlagKeywords) -> AnalysisResult {
        AnalysisResult {
            indicators: self.indicators.into_indicators(keywords),
            prediction: self.prediction.into_prediction(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIndicators {
    #[serde(alias = "rsi")]
    momentum: f64,
    volume: Option<VolumeTrend>,
    trend: Trend,
    #[serde(alias = "ema9Position")]
    ma_fast_position: Option<String>,
    #[serde(alias = "ema21Position")]
    ma_slow_position: Option<String>,
    support: Option<f64>,
    resistance: Option<f64>,
    #[serde(alias = "candlestickPatterns")]
    patterns: Option<Vec<RawPattern>>,
}

impl RawIndicators {
    fn into_indicators(self, keywords: &FlagKeywords) -> Indicators {
        let patterns = self
            .patterns
            .unwrap_or_default()
            .into_iter()
            .map(|pattern| pattern.into_pattern(keywords))
            .collect();

        Indicators {
            momentum: self.momentum,
            volume: self.volume.unwrap_or_default(),
            trend: self.trend,
            ma_fast_position: self.ma_fast_position.unwrap_or_default(),
            ma_slow_position: self.ma_slow_position.unwrap_or_default(),
            support: self.support.unwrap_or_default(),
            resistance: self.resistance.unwrap_or_default(),
            patterns,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPattern {
    #[serde(alias = "pattern")]
    name: String,
    significance: Option<Significance>,
    implication: Option<Bias>,
    description: Option<String>,
    is_breakout: Option<bool>,
    is_reversal: Option<bool>,
}

impl RawPattern {
    fn into_pattern(self, keywords: &FlagKeywords) -> Pattern {
        let description = self.description.unwrap_or_default();
        let inferred = infer_pattern_flags(&self.name, &description, keywords);
        Pattern {
            is_breakout: self.is_breakout.unwrap_or(inferred.is_breakout),
            is_reversal: self.is_reversal.unwrap_or(inferred.is_reversal),
            name: self.name,
            significance: self.significance.unwrap_or_default(),
            implication: self.implication.unwrap_or_default(),
            description,
        }
    }
}

#[derive(Deserialize)]
struct RawPrediction {
    direction: Bias,
    duration: f64,
    confidence: Option<f64>,
    strength: Option<Strength>,
    factors: Option<Vec<String>>,
}

impl RawPrediction {
    fn into_prediction(self) -> Prediction {
        Prediction {
            direction: self.direction,
            duration: self.duration,
            confidence: self.confidence.unwrap_or_default(),
            strength: self.strength.unwrap_or_default(),
            factors: self.factors.unwrap_or_default(),
        }
    }
}
