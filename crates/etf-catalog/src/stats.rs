//! 조정/검사 실행 통계.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 카탈로그 갱신 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStats {
    /// 필터를 통과한 등록부 행 수
    pub registry: usize,
    /// 탐색한 도메인 수
    pub probed: usize,
    /// 유형을 찾은 도메인 수
    pub detected: usize,
    /// 기존 행에 병합된 수
    pub merged: usize,
    /// 새로 추가된 행 수
    pub appended: usize,
    /// 종목 코드를 찾지 못한 신규 펀드 수
    pub unrecognized: usize,
    /// 건너뛴 등록부 행 수 (알 수 없는 유형 코드)
    pub skipped: usize,
    /// 외부 조회 실패 수
    pub failures: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl UpdateStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            registry = self.registry,
            probed = self.probed,
            detected = self.detected,
            merged = self.merged,
            appended = self.appended,
            unrecognized = self.unrecognized,
            skipped = self.skipped,
            failures = self.failures,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "카탈로그 갱신 완료"
        );
    }
}

/// 카탈로그 검사 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckStats {
    /// 전체 행 수
    pub rows: usize,
    /// 불변 조건 위반 수
    pub violations: usize,
    /// 다시 판별한 행 수
    pub checked: usize,
    /// 유형이 달라진 행 수
    pub drift: usize,
    /// 판별 실패 수 (네트워크 등)
    pub failures: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CheckStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            rows = self.rows,
            violations = self.violations,
            checked = self.checked,
            drift = self.drift,
            failures = self.failures,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "카탈로그 검사 완료"
        );
    }
}
