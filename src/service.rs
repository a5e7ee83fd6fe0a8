// 차트 분석 서비스
// 외부 분석 소스를 호출하고 응답을 수집/정제해 최종 레코드를 돌려줍니다.

use crate::config::{FlagKeywords, RefinerConfig};
use crate::diagnostics::{DiagnosticSink, LogSink};
use crate::error::{AnalysisError, AnalysisOutcome};
use crate::ingest::parse_response;
use crate::model::AnalysisResult;
use crate::refiner::RefinementPipeline;
use async_trait::async_trait;
use log::{debug, error, info};
use std::fmt;

/// 데이터 URL 접두사가 없을 때 사용하는 MIME 타입
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// 분석 대상 차트 이미지 (base64 페이로드)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartImage {
    pub mime_type: String,
    pub data: String,
}

impl ChartImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ChartImage {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// 데이터 URL(`data:<mime>;base64,<payload>`)에서 이미지 생성
    ///
    /// 접두사가 없으면 입력 전체를 페이로드로 취급합니다.
    pub fn from_data_url(url: &str) -> Self {
        let url = url.trim();
        match url.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
            Some((header, payload)) => {
                let mime_type = header
                    .split(';')
                    .next()
                    .filter(|mime| !mime.is_empty())
                    .unwrap_or(DEFAULT_MIME_TYPE);
                ChartImage::new(mime_type, payload)
            }
            None => ChartImage::new(DEFAULT_MIME_TYPE, url),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.trim().is_empty()
    }
}

/// 분석 소스 호출 실패
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// 소스에 연결하지 못함 (자격 증명 누락, 네트워크 오류 등)
    Unavailable(String),
    /// 소스가 요청을 거부함
    Rejected { status: u16, message: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "분석 소스 사용 불가: {}", msg),
            SourceError::Rejected { status, message } => {
                write!(f, "분석 소스 거부 (상태 {}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for SourceError {}

impl From<SourceError> for AnalysisError {
    fn from(err: SourceError) -> Self {
        AnalysisError::Transport(err.to_string())
    }
}

/// 차트 이미지를 분석해 원문 응답 텍스트를 돌려주는 외부 소스
#[async_trait]
pub trait AnalysisSource: Send + Sync {
    /// 분석 요청
    ///
    /// # Arguments
    /// * `image` - 분석할 차트 이미지
    ///
    /// # Returns
    /// * `Result<String, SourceError>` - 응답 텍스트 또는 오류
    async fn request_analysis(&self, image: &ChartImage) -> Result<String, SourceError>;
}

/// 분석 서비스
///
/// 소스 호출, 응답 수집, 정제 파이프라인을 하나의 요청 흐름으로 묶습니다.
pub struct ChartAnalysisService<S: AnalysisSource> {
    source: S,
    pipeline: RefinementPipeline,
    flags: FlagKeywords,
}

impl<S: AnalysisSource> ChartAnalysisService<S> {
    /// 기본 설정으로 서비스 생성
    pub fn new(source: S) -> Self {
        Self::with_config(source, &RefinerConfig::default())
    }

    /// 지정한 설정으로 서비스 생성
    pub fn with_config(source: S, config: &RefinerConfig) -> Self {
        ChartAnalysisService {
            source,
            pipeline: RefinementPipeline::new(config),
            flags: config.flags.clone(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 차트 이미지 분석
    pub async fn analyze(&self, image: &ChartImage) -> AnalysisOutcome<AnalysisResult> {
        self.analyze_with_sink(image, &LogSink).await
    }

    /// 지정한 진단 싱크로 차트 이미지 분석
    pub async fn analyze_with_sink(
        &self,
        image: &ChartImage,
        sink: &dyn DiagnosticSink,
    ) -> AnalysisOutcome<AnalysisResult> {
        if image.is_empty() {
            error!("빈 이미지로 분석 요청");
            return Err(AnalysisError::EmptyImage);
        }

        debug!("분석 소스 호출: mime={}", image.mime_type);
        let text = self
            .source
            .request_analysis(image)
            .await
            .inspect_err(|e| error!("분석 소스 호출 실패: {}", e))?;

        self.refine_text_with_sink(&text, sink)
    }

    /// 응답 텍스트를 수집하고 정제 (동기 경로)
    pub fn refine_text(&self, text: &str) -> AnalysisOutcome<AnalysisResult> {
        self.refine_text_with_sink(text, &LogSink)
    }

    fn refine_text_with_sink(
        &self,
        text: &str,
        sink: &dyn DiagnosticSink,
    ) -> AnalysisOutcome<AnalysisResult> {
        let raw = parse_response(text, &self.flags)
            .inspect_err(|e| error!("응답 수집 실패: {}", e))?;
        let refined = self.pipeline.run_with_sink(raw, sink);

        info!(
            "분석 완료: 방향={}, 기간={}분, 패턴 {}개",
            refined.prediction.direction,
            refined.prediction.duration_minutes(),
            refined.indicators.patterns.len()
        );
        Ok(refined)
    }
}
