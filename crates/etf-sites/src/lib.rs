//! # ETF Sites
//!
//! 운용사 플랫폼별 사이트 어댑터와 사이트 유형 판별을 제공합니다.
//!
//! - `sites`: 플랫폼별 어댑터 (`FundSite` 트레이트, `Site` 열거형)
//! - `detect`: 홈페이지 내용으로 어댑터 유형 판별 (`from_url`)
//! - `probe`: 도메인만 알 때 모든 후보를 시도하는 탐색
//! - `http`: 전송 계층 (`Fetcher` 트레이트, reqwest 구현)
//! - `fixture`: 고정 응답 fetcher (테스트용)

pub mod detect;
pub mod fixture;
pub mod http;
pub mod probe;
pub mod retry;
pub mod sites;

pub use detect::{classify_homepage, from_url, normalize_site_url, Classification};
pub use fixture::FixtureFetcher;
pub use http::{Fetcher, HttpRequest, HttpResponse, ReqwestFetcher};
pub use probe::{
    canonical_root, check_validity, normalize_domain, probe_domain, probe_domains, same_domain,
    ProbeResult, PROBE_ORDER, SCHEMES,
};
pub use retry::{with_retry, RetryPolicy};
pub use sites::{
    FundSite, LeveragedMabnaDp, MabnaDp, MabnaHomeData, RayanHamafza, Site, SiteClient,
    TadbirHomeInfo, TadbirPardaz,
};
