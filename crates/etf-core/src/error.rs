//! 수집기 전반의 에러 타입.
//!
//! 어댑터, 사이트 유형 감지, 카탈로그 조정이 모두 같은 에러 타입을 반환합니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum EtfError {
    /// 숫자/날짜 파싱 실패
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// JSON 응답이 손상되었거나 예상과 다른 구조
    #[error("JSON 에러: {0}")]
    Json(String),

    /// 홈페이지에서 플랫폼 시그니처를 찾지 못함
    #[error("사이트 유형을 판별할 수 없음: {0}")]
    Classification(String),

    /// 일시적 네트워크 에러 (타임아웃, 연결 실패, 리다이렉트 초과)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 성공이 아닌 HTTP 상태 코드
    #[error("HTTP {status}: {url}")]
    Status { status: u16, url: String },

    /// 어댑터가 지원하지 않는 기능
    #[error("지원하지 않는 기능: {0}")]
    Unsupported(String),

    /// 잘못된 URL
    #[error("잘못된 URL: {0}")]
    InvalidUrl(String),

    /// 카탈로그 파일 입출력 에러
    #[error("데이터셋 에러: {0}")]
    Dataset(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 외부 서비스(펀드 등록부, 종목 검색) 에러
    #[error("외부 서비스 에러: {0}")]
    Collaborator(String),
}

/// 수집기 작업을 위한 Result 타입.
pub type EtfResult<T> = Result<T, EtfError>;

impl EtfError {
    /// 사이트 검증 경로에서 재시도할 수 있는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        match self {
            EtfError::Network(_) | EtfError::Json(_) => true,
            EtfError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EtfError {
    fn from(err: serde_json::Error) -> Self {
        EtfError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for EtfError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return EtfError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }
        if err.is_timeout() {
            EtfError::Network(format!("timeout: {}", err))
        } else if err.is_connect() {
            EtfError::Network(format!("connect: {}", err))
        } else if err.is_redirect() {
            EtfError::Network(format!("too many redirects: {}", err))
        } else {
            EtfError::Network(err.to_string())
        }
    }
}

impl From<csv::Error> for EtfError {
    fn from(err: csv::Error) -> Self {
        EtfError::Dataset(err.to_string())
    }
}

impl From<std::io::Error> for EtfError {
    fn from(err: std::io::Error) -> Self {
        EtfError::Dataset(err.to_string())
    }
}

impl From<config::ConfigError> for EtfError {
    fn from(err: config::ConfigError) -> Self {
        EtfError::Config(err.to_string())
    }
}
