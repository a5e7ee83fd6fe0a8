// 정제 단계 진단 이벤트
// 단계는 이벤트를 싱크에 넘길 뿐이며, 결과 레코드에는 영향을 주지 않습니다.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

/// 파이프라인 단계 종류
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    DurationNormalizer,
    ConsistencyValidator,
    SignalEnhancer,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::DurationNormalizer => write!(f, "duration_normalizer"),
            StageKind::ConsistencyValidator => write!(f, "consistency_validator"),
            StageKind::SignalEnhancer => write!(f, "signal_enhancer"),
        }
    }
}

/// 진단 이벤트 내용
#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    DurationNormalized { from: f64, to: u32 },
    MomentumClamped { from: f64, to: f64 },
    PatternDropped { name: String, reason: String },
    ImplicationCorrected { name: String, from: String, to: String },
    PatternRenamed { from: String, to: String },
    PatternSynthesized { name: String },
    FactorAppended { factor: String },
    CorrectionRuleApplied { rule: String },
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::DurationNormalized { from, to } => {
                write!(f, "기간 정규화: {} -> {}", from, to)
            }
            DiagnosticKind::MomentumClamped { from, to } => {
                write!(f, "모멘텀 보정: {} -> {}", from, to)
            }
            DiagnosticKind::PatternDropped { name, reason } => {
                write!(f, "패턴 제거: {} ({})", name, reason)
            }
            DiagnosticKind::ImplicationCorrected { name, from, to } => {
                write!(f, "함의 보정: {} {} -> {}", name, from, to)
            }
            DiagnosticKind::PatternRenamed { from, to } => {
                write!(f, "패턴 이름 변경: {} -> {}", from, to)
            }
            DiagnosticKind::PatternSynthesized { name } => write!(f, "패턴 추가: {}", name),
            DiagnosticKind::FactorAppended { factor } => write!(f, "근거 추가: {}", factor),
            DiagnosticKind::CorrectionRuleApplied { rule } => {
                write!(f, "보정 규칙 적용: {}", rule)
            }
        }
    }
}

/// 진단 이벤트
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub at: DateTime<Utc>,
    pub stage: StageKind,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(stage: StageKind, kind: DiagnosticKind) -> Self {
        Diagnostic {
            at: Utc::now(),
            stage,
            kind,
        }
    }
}

/// 진단 이벤트 구독자
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: Diagnostic);
}

/// 이벤트를 버리는 싱크
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn record(&self, _event: Diagnostic) {}
}

/// `log` 파사드로 이벤트를 전달하는 싱크 (파이프라인 기본값)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, event: Diagnostic) {
        debug!("[{}] {}", event.stage, event.kind);
    }
}

/// 이벤트를 메모리에 모으는 싱크
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 기록된 이벤트 복사본
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// 기록된 이벤트 내용만 반환
    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, event: Diagnostic) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
