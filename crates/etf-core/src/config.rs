//! 설정 관리.
//!
//! 기본값 → TOML 파일(선택) → `ETF` 접두사 환경 변수 순으로 덮어씁니다.
//! 예: `ETF__HTTP__VERIFY_TLS=false`, `ETF__PROBE__MAX_ATTEMPTS=5`.

use crate::error::EtfResult;
use crate::types::FundType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 전송 설정
    pub http: HttpConfig,
    /// 사이트 검증(프로빙) 설정
    pub probe: ProbeConfig,
    /// 카탈로그 설정
    pub catalog: CatalogConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// HTTP 전송 설정.
///
/// 인증서 검증은 전역 토글이 아니라 fetcher 생성 시 전달되는 값입니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// TLS 인증서 검증 여부
    pub verify_tls: bool,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 읽기 타임아웃 (초)
    pub read_timeout_secs: u64,
    /// 전체 요청 타임아웃 (초)
    pub total_timeout_secs: u64,
    /// User-Agent 헤더
    pub user_agent: String,
    /// 최대 리다이렉트 횟수
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            total_timeout_secs: 60,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            max_redirects: 10,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }
}

/// 사이트 검증 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 후보(어댑터 × 스킴)당 최대 시도 횟수
    pub max_attempts: u32,
    /// 재시도 간 대기 (밀리초)
    pub retry_delay_ms: u64,
    /// 동시에 검증할 도메인 수
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 500,
            concurrency: 16,
        }
    }
}

impl ProbeConfig {
    /// 재시도 간 대기를 Duration으로 반환
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// 카탈로그 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// 카탈로그 CSV 경로
    pub dataset_path: PathBuf,
    /// 등록부 필터에서 제외할 펀드 유형 코드
    pub excluded_fund_type_codes: Vec<i64>,
    /// 등록부 유형 코드 → 카탈로그 펀드 유형
    pub fund_type_codes: BTreeMap<String, FundType>,
    /// 거래 가능 펀드를 나타내는 투자 유형 값
    pub negotiable_invest_type: String,
    /// 동시에 실행할 종목 검색 수
    pub search_concurrency: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let fund_type_codes = [
            (4, FundType::Fixed),
            (5, FundType::Commodity),
            (6, FundType::Stock),
            (7, FundType::Mixed),
            (17, FundType::Fof),
            (18, FundType::Reit),
        ]
        .into_iter()
        .map(|(code, fund_type)| (code.to_string(), fund_type))
        .collect();

        Self {
            dataset_path: PathBuf::from("data/dataset.csv"),
            excluded_fund_type_codes: vec![11, 12, 13, 14, 16],
            fund_type_codes,
            negotiable_invest_type: "Negotiable".to_string(),
            search_concurrency: 8,
        }
    }
}

impl CatalogConfig {
    /// 등록부 유형 코드를 펀드 유형으로 변환합니다.
    pub fn fund_type_for(&self, code: i64) -> Option<FundType> {
        self.fund_type_codes.get(&code.to_string()).copied()
    }

    /// 제외 대상 유형 코드인지 확인합니다.
    pub fn is_excluded(&self, code: i64) -> bool {
        self.excluded_fund_type_codes.contains(&code)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> EtfResult<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("ETF")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("catalog.excluded_fund_type_codes")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> EtfResult<Self> {
        Self::load("config/default.toml")
    }
}
