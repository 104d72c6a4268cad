//! 펀드 카탈로그 행과 펀드 유형.

use crate::types::SiteType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 펀드 유형 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FundType {
    /// 주식형
    Stock,
    /// 채권형(고정수익)
    Fixed,
    /// 혼합형
    Mixed,
    /// 상품(금 등)
    Commodity,
    /// 재간접
    #[serde(rename = "FOF")]
    Fof,
    /// 부동산
    #[serde(rename = "REIT")]
    Reit,
    /// 업종
    Sector,
    /// 레버리지
    Leveraged,
    /// 인덱스
    Index,
    /// 보장형
    Guarantee,
}

impl FundType {
    pub const ALL: [FundType; 10] = [
        FundType::Stock,
        FundType::Fixed,
        FundType::Mixed,
        FundType::Commodity,
        FundType::Fof,
        FundType::Reit,
        FundType::Sector,
        FundType::Leveraged,
        FundType::Index,
        FundType::Guarantee,
    ];

    /// 카탈로그에 저장되는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            FundType::Stock => "Stock",
            FundType::Fixed => "Fixed",
            FundType::Mixed => "Mixed",
            FundType::Commodity => "Commodity",
            FundType::Fof => "FOF",
            FundType::Reit => "REIT",
            FundType::Sector => "Sector",
            FundType::Leveraged => "Leveraged",
            FundType::Index => "Index",
            FundType::Guarantee => "Guarantee",
        }
    }
}

impl fmt::Display for FundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FundType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FundType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown fund type: {}", s))
    }
}

/// 카탈로그의 한 행 (거래 가능한 ETF 하나).
///
/// 컬럼 순서가 곧 저장 순서입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRecord {
    /// 거래 심볼 (카탈로그 기본 키)
    pub l18: String,
    /// 표시 이름
    pub name: String,
    /// 펀드 유형
    #[serde(rename = "type")]
    pub fund_type: FundType,
    /// 거래소 종목 코드
    pub instrument_code: Option<String>,
    /// 감독기관 등록 번호
    pub registration_number: Option<String>,
    /// 어댑터 기본 URL
    pub url: Option<String>,
    /// 어댑터 유형
    pub adapter_type: Option<SiteType>,
}

impl FundRecord {
    pub fn new(l18: impl Into<String>, name: impl Into<String>, fund_type: FundType) -> Self {
        Self {
            l18: l18.into(),
            name: name.into(),
            fund_type,
            instrument_code: None,
            registration_number: None,
            url: None,
            adapter_type: None,
        }
    }

    /// 사이트가 지정되어 있으면 (URL, 어댑터 유형)을 반환합니다.
    pub fn site(&self) -> Option<(&str, SiteType)> {
        match (&self.url, self.adapter_type) {
            (Some(url), Some(site_type)) => Some((url.as_str(), site_type)),
            _ => None,
        }
    }
}
