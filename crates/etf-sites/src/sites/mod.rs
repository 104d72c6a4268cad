//! 운용사 플랫폼별 사이트 어댑터.
//!
//! 모든 어댑터는 `FundSite` 트레이트를 구현하고, `Site` 열거형이 닫힌 어댑터 집합을 나타냅니다.
//! 카탈로그 행에서는 `Site::new(adapter_type, url, fetcher)`로 만들고, 이후에는 트레이트로만 호출합니다.
//!
//! ## 사용 예시
//! ```rust,ignore
//! let site = Site::new(SiteType::TadbirPardaz, "https://modirfund.ir/", fetcher)?;
//! let live = site.live_navps().await?;
//! println!("발행가: {}, 환매가: {}", live.creation, live.redemption);
//! ```

mod client;
mod leveraged_mabna;
mod mabna;
mod rayan;
mod tadbir;

pub use client::{split_site_url, SiteClient};
pub use leveraged_mabna::{LeveragedMabnaDp, MabnaHomeData};
pub use mabna::MabnaDp;
pub use rayan::RayanHamafza;
pub use tadbir::{TadbirHomeInfo, TadbirPardaz};

use crate::http::Fetcher;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use etf_core::{
    AssetAllocation, DividendRecord, EtfError, EtfResult, LiveNavps, NavpsHistory, SiteType,
};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// 사이트 어댑터 공통 기능.
#[async_trait]
pub trait FundSite: Send + Sync {
    fn site_type(&self) -> SiteType;

    fn client(&self) -> &SiteClient;

    /// 자산 배분 분류 허용 목록
    fn known_labels(&self) -> &'static [&'static str];

    /// 현금성 자산으로 보는 분류
    fn cache_labels(&self) -> &'static [&'static str];

    /// 카탈로그에 저장되는 URL
    fn url(&self) -> String {
        self.client().url()
    }

    /// 마지막 응답의 최종 URL
    fn last_response_url(&self) -> Option<Url> {
        self.client().last_response_url()
    }

    /// 현재 발행가/환매가
    async fn live_navps(&self) -> EtfResult<LiveNavps>;

    /// 전체 NAVPS 이력
    async fn navps_history(&self) -> EtfResult<NavpsHistory>;

    /// 현재 자산 배분. 허용 목록 밖의 분류는 경고만 남기고 결과에 포함합니다.
    async fn asset_allocation(&self) -> EtfResult<AssetAllocation>;

    /// 현금성 자산 비율 [0, 1]
    async fn cache(&self) -> EtfResult<f64> {
        let allocation = self.asset_allocation().await?;
        Ok(allocation.sum_of(self.cache_labels()))
    }

    /// 홈페이지에 표시된 플랫폼 버전
    async fn version(&self) -> EtfResult<String> {
        Err(unsupported(self.site_type(), "version"))
    }

    /// 레버리지 배율 (레버리지 펀드만)
    async fn leverage(&self) -> EtfResult<f64> {
        Err(unsupported(self.site_type(), "leverage"))
    }

    /// 이익 분배 이력
    async fn dividend_history(&self) -> EtfResult<Vec<DividendRecord>> {
        Err(unsupported(self.site_type(), "dividend_history"))
    }

    /// 감독기관 등록 번호
    async fn reg_no(&self) -> EtfResult<String> {
        Err(unsupported(self.site_type(), "reg_no"))
    }
}

pub(crate) fn unsupported(site_type: SiteType, operation: &str) -> EtfError {
    EtfError::Unsupported(format!("{}::{}", site_type, operation))
}

/// 닫힌 어댑터 집합.
#[derive(Debug)]
pub enum Site {
    MabnaDp(MabnaDp),
    RayanHamafza(RayanHamafza),
    TadbirPardaz(TadbirPardaz),
    LeveragedMabnaDp(LeveragedMabnaDp),
}

impl Site {
    /// 어댑터 유형과 URL로 어댑터를 만듭니다.
    pub fn new(site_type: SiteType, url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        Ok(match site_type {
            SiteType::MabnaDp => Site::MabnaDp(MabnaDp::new(url, fetcher)?),
            SiteType::RayanHamafza => Site::RayanHamafza(RayanHamafza::new(url, fetcher)?),
            SiteType::RayanHamafzaMultiNav => {
                Site::RayanHamafza(RayanHamafza::multi_nav(url, fetcher)?)
            }
            SiteType::TadbirPardaz => Site::TadbirPardaz(TadbirPardaz::new(url, fetcher)?),
            SiteType::TadbirPardazMultiNav => {
                Site::TadbirPardaz(TadbirPardaz::multi_nav(url, fetcher)?)
            }
            SiteType::LeveragedTadbirPardaz => {
                Site::TadbirPardaz(TadbirPardaz::leveraged(url, fetcher)?)
            }
            SiteType::LeveragedMabnaDp => {
                Site::LeveragedMabnaDp(LeveragedMabnaDp::new(url, fetcher)?)
            }
        })
    }

    fn inner(&self) -> &dyn FundSite {
        match self {
            Site::MabnaDp(site) => site,
            Site::RayanHamafza(site) => site,
            Site::TadbirPardaz(site) => site,
            Site::LeveragedMabnaDp(site) => site,
        }
    }
}

impl PartialEq for Site {
    fn eq(&self, other: &Self) -> bool {
        self.site_type() == other.site_type() && self.url() == other.url()
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.site_type(), self.url())
    }
}

#[async_trait]
impl FundSite for Site {
    fn site_type(&self) -> SiteType {
        self.inner().site_type()
    }

    fn client(&self) -> &SiteClient {
        self.inner().client()
    }

    fn known_labels(&self) -> &'static [&'static str] {
        self.inner().known_labels()
    }

    fn cache_labels(&self) -> &'static [&'static str] {
        self.inner().cache_labels()
    }

    async fn live_navps(&self) -> EtfResult<LiveNavps> {
        self.inner().live_navps().await
    }

    async fn navps_history(&self) -> EtfResult<NavpsHistory> {
        self.inner().navps_history().await
    }

    async fn asset_allocation(&self) -> EtfResult<AssetAllocation> {
        self.inner().asset_allocation().await
    }

    async fn cache(&self) -> EtfResult<f64> {
        self.inner().cache().await
    }

    async fn version(&self) -> EtfResult<String> {
        self.inner().version().await
    }

    async fn leverage(&self) -> EtfResult<f64> {
        self.inner().leverage().await
    }

    async fn dividend_history(&self) -> EtfResult<Vec<DividendRecord>> {
        self.inner().dividend_history().await
    }

    async fn reg_no(&self) -> EtfResult<String> {
        self.inner().reg_no().await
    }
}

/// JSON 본문을 역직렬화합니다.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> EtfResult<T> {
    Ok(serde_json::from_slice(body)?)
}

/// 허용 목록 밖의 자산 배분 분류가 있으면 경고를 남깁니다.
pub(crate) fn warn_unknown_labels(site: &dyn FundSite, allocation: &AssetAllocation) {
    let unknown = allocation.unknown_labels(site.known_labels());
    if !unknown.is_empty() {
        tracing::warn!(
            url = %site.url(),
            site_type = %site.site_type(),
            unknown = ?unknown,
            "자산 배분에 알 수 없는 분류"
        );
    }
}

/// `(1 + 보통 단위 순자산 / 우선 단위 순자산) × (1 − 현금 비율)`
pub(crate) fn leverage_ratio(common_nav: f64, preferred_nav: f64, cache: f64) -> EtfResult<f64> {
    if preferred_nav == 0.0 {
        return Err(EtfError::Parse(
            "preferred unit net asset value is zero".to_string(),
        ));
    }
    Ok((1.0 + common_nav / preferred_nav) * (1.0 - cache))
}

/// 차트 API의 그레고리력 날짜 문자열을 파싱합니다.
pub(crate) fn parse_gregorian_date(s: &str) -> EtfResult<NaiveDate> {
    let s = s.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.naive_local().date());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %H:%M:%S",
    ] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(datetime.date());
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date);
        }
    }
    Err(EtfError::Parse(format!("unrecognized date: {:?}", s)))
}

/// ISO-8601 시각을 현지 시각(오프셋 제거)으로 파싱합니다.
pub(crate) fn parse_iso_datetime(s: &str) -> EtfResult<NaiveDateTime> {
    let s = s.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(datetime);
        }
    }
    Err(EtfError::Parse(format!("unrecognized timestamp: {:?}", s)))
}
