use crate::config::RefinerConfig;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

/// 설정 로드 오류
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 파일 오류
    FileError(String),
    /// 파싱 오류
    ParseError(String),
    /// 유효성 검사 오류
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileError(msg) => write!(f, "설정 파일 오류: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "설정 파싱 오류: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "설정 유효성 검사 오류: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// 설정 로드 결과
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 설정 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    /// 파일 확장자로 감지 (문자열 로드 시에는 JSON 후 TOML 순으로 시도)
    Auto,
}

/// 설정 유효성 검사 트레이트
pub trait ConfigValidation {
    fn validate(&self) -> ConfigResult<()>;
}

/// 설정 파일 로더
#[derive(Debug)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// 정제 파이프라인 설정을 파일에서 로드
    pub fn load_refiner_config(path: &Path) -> ConfigResult<RefinerConfig> {
        Self::load_from_file(path, ConfigFormat::Auto)
    }

    /// 파일에서 설정 로드
    ///
    /// # Arguments
    /// * `path` - 설정 파일 경로
    /// * `format` - 설정 파일 형식 (Auto면 확장자로 감지)
    ///
    /// # Returns
    /// * `ConfigResult<T>` - 검증된 설정 객체 또는 오류
    pub fn load_from_file<T>(path: &Path, format: ConfigFormat) -> ConfigResult<T>
    where
        T: DeserializeOwned + ConfigValidation,
    {
        debug!("설정 파일 로드 시작: {}", path.display());

        let format = match format {
            ConfigFormat::Auto => Self::detect_format(path)?,
            other => other,
        };

        let content = std::fs::read_to_string(path).map_err(|e| {
            error!("설정 파일 읽기 실패: {} - {}", path.display(), e);
            ConfigError::FileError(format!("파일 읽기 실패: {}", e))
        })?;

        let config: T = Self::parse(&content, format)?;
        config.validate().inspect_err(|e| {
            error!("설정 유효성 검사 실패: {} - {}", path.display(), e);
        })?;

        info!("설정 파일 로드 완료: {}", path.display());
        Ok(config)
    }

    /// 문자열에서 설정 로드
    pub fn load_from_string<T>(content: &str, format: ConfigFormat) -> ConfigResult<T>
    where
        T: DeserializeOwned + ConfigValidation,
    {
        let config: T = Self::parse(content, format)?;
        config.validate()?;
        Ok(config)
    }

    /// 키-값 맵에서 설정 로드
    ///
    /// # Arguments
    /// * `map` - 최상위 필드 이름과 값의 맵
    ///
    /// # Returns
    /// * `ConfigResult<T>` - 검증된 설정 또는 오류
    pub fn load_from_map<T, V>(map: &HashMap<String, V>) -> ConfigResult<T>
    where
        T: DeserializeOwned + ConfigValidation,
        V: Serialize,
    {
        let json = serde_json::to_string(map)
            .map_err(|e| ConfigError::ParseError(format!("맵을 JSON으로 변환 실패: {}", e)))?;

        let config: T = Self::parse_json(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일 저장
    ///
    /// 저장 전에 유효성 검사를 수행하므로 잘못된 설정은 기록되지 않습니다.
    pub fn save_to_file<T>(config: &T, path: &Path, format: ConfigFormat) -> ConfigResult<()>
    where
        T: Serialize + ConfigValidation,
    {
        config.validate()?;

        let format = match format {
            // 확장자를 모르면 TOML
            ConfigFormat::Auto => Self::detect_format(path).unwrap_or(ConfigFormat::Toml),
            other => other,
        };

        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(config)
                .map_err(|e| ConfigError::ParseError(format!("JSON 직렬화 실패: {}", e)))?,
            _ => toml::to_string_pretty(config)
                .map_err(|e| ConfigError::ParseError(format!("TOML 직렬화 실패: {}", e)))?,
        };

        std::fs::write(path, content).map_err(|e| {
            error!("설정 파일 쓰기 실패: {} - {}", path.display(), e);
            ConfigError::FileError(format!("파일 쓰기 실패: {}", e))
        })?;

        info!("설정 파일 저장 완료: {}", path.display());
        Ok(())
    }

    fn parse<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
        match format {
            ConfigFormat::Json => Self::parse_json(content),
            ConfigFormat::Toml => Self::parse_toml(content),
            ConfigFormat::Auto => Self::parse_json(content).or_else(|_| Self::parse_toml(content)),
        }
    }

    fn parse_json<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
        serde_json::from_str(content).map_err(|e| {
            warn!("JSON 파싱 실패: {}", e);
            ConfigError::ParseError(format!("JSON 파싱 실패: {}", e))
        })
    }

    fn parse_toml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
        toml::from_str(content).map_err(|e| {
            warn!("TOML 파싱 실패: {}", e);
            ConfigError::ParseError(format!("TOML 파싱 실패: {}", e))
        })
    }

    fn detect_format(path: &Path) -> ConfigResult<ConfigFormat> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => {
                warn!("지원되지 않는 파일 형식: {}", path.display());
                Err(ConfigError::FileError(format!(
                    "파일 형식을 감지할 수 없음: {}",
                    path.display()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorrectionRule, RuleAction, RuleCondition};
    use crate::model::{Bias, Trend};
    use tempfile::tempdir;

    fn config_with_rule() -> RefinerConfig {
        let mut config = RefinerConfig::default();
        config.correction_rules.push(CorrectionRule {
            name: "sideways-oversold".to_string(),
            when: RuleCondition {
                trend: Some(Trend::Sideways),
                momentum_at_most: Some(30.0),
                ..RuleCondition::default()
            },
            then: RuleAction {
                direction: Some(Bias::Bullish),
                ..RuleAction::default()
            },
        });
        config
    }

    #[test]
    fn test_load_from_toml_string() {
        let toml_str = r#"
            [momentum]
            oversold = 25.0
            near_oversold_ceiling = 35.0
            overbought = 75.0

            [[correction_rules]]
            name = "bullish-floor"
            when = { direction = "bullish" }
            then = { min_confidence = 55.0 }
        "#;
        let config =
            ConfigLoader::load_from_string::<RefinerConfig>(toml_str, ConfigFormat::Toml).unwrap();
        assert_eq!(config.momentum.oversold, 25.0);
        assert_eq!(config.correction_rules.len(), 1);
        assert_eq!(config.correction_rules[0].when.direction, Some(Bias::Bullish));
        // 누락된 테이블은 기본값
        assert!(!config.flags.reversal_in_name.is_empty());
    }

    #[test]
    fn test_load_from_json_string_auto() {
        let json = r#"{"momentum":{"oversold":20.0,"near_oversold_ceiling":30.0,"overbought":80.0}}"#;
        let config =
            ConfigLoader::load_from_string::<RefinerConfig>(json, ConfigFormat::Auto).unwrap();
        assert_eq!(config.momentum.overbought, 80.0);
    }

    #[test]
    fn test_validation_error() {
        let json = r#"{"momentum":{"oversold":50.0,"near_oversold_ceiling":40.0,"overbought":70.0}}"#;
        let result = ConfigLoader::load_from_string::<RefinerConfig>(json, ConfigFormat::Json);
        match result {
            Err(ConfigError::ValidationError(_)) => (),
            other => panic!("유효성 검사 오류가 발생해야 함: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let result = ConfigLoader::load_from_string::<RefinerConfig>("{not json", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempdir().unwrap();
        let config = config_with_rule();

        let json_path = dir.path().join("refiner.json");
        ConfigLoader::save_to_file(&config, &json_path, ConfigFormat::Auto).unwrap();
        let loaded_json = ConfigLoader::load_refiner_config(&json_path).unwrap();
        assert_eq!(loaded_json, config);

        let toml_path = dir.path().join("refiner.toml");
        ConfigLoader::save_to_file(&config, &toml_path, ConfigFormat::Auto).unwrap();
        let loaded_toml = ConfigLoader::load_refiner_config(&toml_path).unwrap();
        assert_eq!(loaded_toml, config);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("refiner.yaml");
        std::fs::write(&path, "momentum: {}").unwrap();
        assert!(matches!(
            ConfigLoader::load_refiner_config(&path),
            Err(ConfigError::FileError(_))
        ));
    }

    #[test]
    fn test_load_from_map() {
        let mut map = HashMap::new();
        map.insert(
            "momentum".to_string(),
            serde_json::json!({"oversold": 25.0, "near_oversold_ceiling": 35.0, "overbought": 75.0}),
        );
        let config: RefinerConfig = ConfigLoader::load_from_map(&map).unwrap();
        assert_eq!(config.momentum.oversold, 25.0);
        assert_eq!(config.flags, RefinerConfig::default().flags);

        map.insert(
            "momentum".to_string(),
            serde_json::json!({"oversold": 50.0, "near_oversold_ceiling": 40.0, "overbought": 70.0}),
        );
        let result: ConfigResult<RefinerConfig> = ConfigLoader::load_from_map(&map);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
