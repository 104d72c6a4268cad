//! 도메인만 알 때 어댑터 유형을 찾는 탐색.
//!
//! 모든 (스킴, 어댑터 유형) 후보로 실시간 가격을 동시에 요청하고,
//! 정해진 순서에서 가장 앞선 성공 후보를 답으로 씁니다.
//! 저장되는 URL은 리다이렉트 후 최종 호스트입니다.

use crate::http::Fetcher;
use crate::retry::{with_retry, RetryPolicy};
use crate::sites::{FundSite, Site};
use etf_core::{EtfError, EtfResult, ProbeConfig, SiteType};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use url::Url;

/// 흔한 플랫폼부터
pub const PROBE_ORDER: [SiteType; 5] = [
    SiteType::RayanHamafza,
    SiteType::TadbirPardaz,
    SiteType::MabnaDp,
    SiteType::LeveragedTadbirPardaz,
    SiteType::LeveragedMabnaDp,
];

pub const SCHEMES: [&str; 2] = ["https", "http"];

/// 탐색 성공 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// `scheme://host[:port]/`
    pub url: String,
    pub site_type: SiteType,
}

/// 도메인 문자열을 소문자 호스트로 정리합니다 (스킴, 경로 제거).
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().to_lowercase();
    let without_scheme = domain
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&domain);
    without_scheme
        .split(|c| c == '/' || c == '#' || c == '?')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// `www.` 유무와 대소문자를 무시하고 같은 도메인인지 비교합니다.
pub fn same_domain(a: &str, b: &str) -> bool {
    fn bare(domain: &str) -> String {
        let domain = normalize_domain(domain);
        domain
            .strip_prefix("www.")
            .map(str::to_string)
            .unwrap_or(domain)
    }
    bare(a) == bare(b)
}

/// 최종 URL에서 `scheme://host[:port]/`만 남깁니다.
pub fn canonical_root(url: &Url) -> EtfResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| EtfError::InvalidUrl(format!("{} (no host)", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    })
}

/// 실시간 가격을 받아 사이트가 유효한지 확인하고, 최종 루트 URL을 돌려줍니다.
///
/// 일시적 에러만 정책에 따라 재시도합니다.
pub async fn check_validity(site: &Site, policy: &RetryPolicy) -> EtfResult<String> {
    let label = site.to_string();
    with_retry(policy, &label, || site.live_navps()).await?;
    let final_url = site
        .last_response_url()
        .ok_or_else(|| EtfError::Network(format!("{} (no response recorded)", label)))?;
    canonical_root(&final_url)
}

/// 도메인 하나의 어댑터 유형을 찾습니다. 어느 후보도 성공하지 못하면 `None`입니다.
pub async fn probe_domain(
    domain: &str,
    fetcher: Arc<dyn Fetcher>,
    policy: &RetryPolicy,
) -> Option<ProbeResult> {
    let host = normalize_domain(domain);
    let host = &host;
    let candidates: Vec<(SiteType, Site)> = SCHEMES
        .iter()
        .flat_map(|scheme| {
            let url = format!("{}://{}/", scheme, host);
            let fetcher = fetcher.clone();
            PROBE_ORDER.iter().filter_map(move |site_type| {
                match Site::new(*site_type, &url, fetcher.clone()) {
                    Ok(site) => Some((*site_type, site)),
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "후보 어댑터 생성 실패");
                        None
                    }
                }
            })
        })
        .collect();

    let checks = candidates.iter().map(|(site_type, site)| async move {
        let result = check_validity(site, policy).await;
        if let Err(e) = &result {
            tracing::debug!(domain = %host, site_type = %site_type, error = %e, "후보 실패");
        }
        result
    });
    let results = join_all(checks).await;

    let found = candidates
        .iter()
        .zip(results)
        .find_map(|((site_type, _), result)| {
            result.ok().map(|url| ProbeResult {
                url,
                site_type: *site_type,
            })
        });

    match &found {
        Some(result) => {
            tracing::info!(domain = %host, site_type = %result.site_type, url = %result.url, "사이트 유형 확인")
        }
        None => tracing::warn!(domain = %host, "사이트 유형을 찾지 못함"),
    }
    found
}

/// 여러 도메인을 동시에 탐색합니다. 한 도메인의 실패가 다른 도메인을 막지 않습니다.
///
/// 결과 순서는 완료 순서입니다.
pub async fn probe_domains(
    domains: Vec<String>,
    fetcher: Arc<dyn Fetcher>,
    config: &ProbeConfig,
) -> Vec<(String, Option<ProbeResult>)> {
    let policy = RetryPolicy::from(config);
    let policy = &policy;
    stream::iter(domains)
        .map(|domain| {
            let fetcher = fetcher.clone();
            async move {
                let result = probe_domain(&domain, fetcher, policy).await;
                (domain, result)
            }
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await
}
