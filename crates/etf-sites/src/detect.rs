//! 홈페이지 내용으로 사이트 어댑터 유형을 판별합니다.
//!
//! 플랫폼마다 고유한 문자열(CSS 클래스, 제작사 이름, 도메인 조각)을 정해진 순서로 찾고,
//! 세부 변형(레버리지, 멀티 바스켓)은 같은 홈페이지에서 읽은 플래그로 구분합니다.

use crate::http::{Fetcher, HttpRequest};
use crate::sites::{Site, TadbirHomeInfo};
use etf_core::{EtfError, EtfResult, SiteType};
use std::sync::Arc;
use url::Url;

const TADBIR_MARKER: &str = r#"<div class="tadbirLogo"></div>"#;
const RAYAN_MARKER: &str = "Rayan Ham Afza";
const MABNA_MARKER: &str = "://mabnadp.com";
const MABNA_LEVERAGE_MARKER: &str = r#"\"isLeverage\":true"#;

/// 홈페이지 판별 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub site_type: SiteType,
    /// URL에 식별자가 없을 때 쓸 기본 바스켓 (멀티 바스켓 사이트)
    pub default_basket: Option<String>,
}

impl Classification {
    fn plain(site_type: SiteType) -> Self {
        Self {
            site_type,
            default_basket: None,
        }
    }
}

/// 홈페이지 HTML만으로 어댑터 유형을 판별합니다.
pub fn classify_homepage(html: &str) -> Option<Classification> {
    if html.contains(TADBIR_MARKER) {
        let info = TadbirHomeInfo::parse(html);
        return Some(if info.is_leveraged_mode {
            Classification::plain(SiteType::LeveragedTadbirPardaz)
        } else if info.is_etf_multi_nav_mode {
            Classification {
                site_type: SiteType::TadbirPardazMultiNav,
                default_basket: info.first_basket().map(str::to_string),
            }
        } else {
            Classification::plain(SiteType::TadbirPardaz)
        });
    }
    if html.contains(RAYAN_MARKER) {
        return Some(Classification::plain(SiteType::RayanHamafza));
    }
    if html.contains(MABNA_MARKER) {
        return Some(Classification::plain(if html.contains(MABNA_LEVERAGE_MARKER) {
            SiteType::LeveragedMabnaDp
        } else {
            SiteType::MabnaDp
        }));
    }
    None
}

/// URL을 `/`로 끝나는 기본 URL과 `#` 뒤 식별자로 정리합니다.
pub fn normalize_site_url(url: &str) -> EtfResult<(Url, Option<String>)> {
    let (base, fragment) = match url.trim().split_once('#') {
        Some((base, fragment)) => (base, Some(fragment.trim()).filter(|f| !f.is_empty())),
        None => (url.trim(), None),
    };
    let mut base = Url::parse(base).map_err(|e| EtfError::InvalidUrl(format!("{}: {}", url, e)))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    Ok((base, fragment.map(str::to_string)))
}

/// URL의 홈페이지를 받아 어댑터를 만듭니다.
///
/// 입력 URL의 식별자(`#` 뒤)가 판별 결과의 기본 바스켓보다 우선합니다.
/// 어떤 플랫폼 문자열도 찾지 못하면 `EtfError::Classification`을 반환합니다.
pub async fn from_url(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Site> {
    let (base, fragment) = normalize_site_url(url)?;
    let response = fetcher.get(&HttpRequest::get(base.clone())).await?;
    let html = response.text();

    let classification =
        classify_homepage(&html).ok_or_else(|| EtfError::Classification(base.to_string()))?;

    let discriminator = fragment.or(classification.default_basket);
    if classification.site_type == SiteType::TadbirPardazMultiNav && discriminator.is_none() {
        return Err(EtfError::Classification(format!(
            "{} (multi-basket site without baskets)",
            base
        )));
    }

    let site_url = match discriminator {
        Some(id) => format!("{}#{}", base, id),
        None => base.to_string(),
    };
    tracing::debug!(url = %site_url, site_type = %classification.site_type, "사이트 유형 판별");
    Site::new(classification.site_type, &site_url, fetcher)
}
