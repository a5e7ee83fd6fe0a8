use std::fmt;

/// 분석 요청 실패 유형
///
/// 개별 필드 이상(기간 범위 밖, 플래그 누락 등)은 오류가 아니라 정규화 대상이므로
/// 여기에 포함되지 않습니다.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// 이미지 데이터가 비어 있음
    EmptyImage,
    /// 상류 모델 호출 실패
    Transport(String),
    /// 응답 텍스트에서 JSON을 추출/파싱하지 못함
    Extraction(String),
    /// JSON은 파싱되었으나 필수 구조가 맞지 않음
    Structure(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::EmptyImage => write!(f, "이미지 데이터가 제공되지 않았습니다"),
            AnalysisError::Transport(msg) => write!(f, "분석 서비스 오류: {}", msg),
            AnalysisError::Extraction(msg) => write!(f, "응답 JSON 추출 실패: {}", msg),
            AnalysisError::Structure(msg) => write!(f, "응답 구조 오류: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// 분석 결과 타입
pub type AnalysisOutcome<T> = Result<T, AnalysisError>;
