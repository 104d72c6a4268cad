//! 외부 데이터 소스 인터페이스.
//!
//! 감독기관 펀드 등록부와 시장 종목 서비스는 이 크레이트 밖에서 구현되고,
//! 조정 엔진은 트레이트로만 호출합니다.

use async_trait::async_trait;
use etf_core::{EtfResult, FundType};

/// 감독기관 등록부의 펀드 한 건.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryFund {
    /// 등록 번호 (카탈로그 조인 키)
    pub reg_no: String,
    pub name: String,
    /// 등록부의 숫자 유형 코드
    pub fund_type_code: i64,
    /// 투자 유형 (거래 가능 여부)
    pub type_of_invest: String,
    /// 설립 절차 완료 여부
    pub is_completed: bool,
    /// 신고된 웹사이트 도메인
    pub website: Option<String>,
}

/// 시장 종목 정보.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub l18: String,
    pub name: String,
    pub instrument_code: String,
    pub fund_type: Option<FundType>,
}

/// 감독기관 펀드 등록부.
#[async_trait]
pub trait FundRegistry: Send + Sync {
    async fn funds(&self) -> EtfResult<Vec<RegistryFund>>;
}

/// 시장 종목 검색/목록 서비스.
#[async_trait]
pub trait InstrumentService: Send + Sync {
    /// 이름으로 종목을 검색합니다.
    async fn search(&self, name: &str) -> EtfResult<Vec<Instrument>>;

    /// 거래 중인 ETF 전체 목록
    async fn etf_instruments(&self) -> EtfResult<Vec<Instrument>>;
}
