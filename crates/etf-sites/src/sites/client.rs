//! 어댑터 공통 요청 처리.

use crate::http::{Fetcher, HttpRequest, HttpResponse};
use etf_core::{EtfError, EtfResult};
use std::fmt;
use std::sync::{Arc, Mutex};
use url::Url;

/// 저장된 사이트 URL을 기본 URL과 펀드/바스켓 식별자(`#` 뒤)로 나눕니다.
///
/// 기본 URL은 `/`로 끝나야 합니다.
pub fn split_site_url(url: &str) -> EtfResult<(Url, Option<String>)> {
    let (base, discriminator) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment.trim()).filter(|f| !f.is_empty())),
        None => (url, None),
    };

    if !base.ends_with('/') {
        return Err(EtfError::InvalidUrl(format!("{} (must end with `/`)", url)));
    }
    let base = Url::parse(base).map_err(|e| EtfError::InvalidUrl(format!("{}: {}", url, e)))?;
    Ok((base, discriminator.map(str::to_string)))
}

/// 기본 URL에 묶인 요청 도우미. 마지막 응답의 최종 URL을 기억합니다.
pub struct SiteClient {
    base_url: Url,
    discriminator: Option<String>,
    fetcher: Arc<dyn Fetcher>,
    last_url: Mutex<Option<Url>>,
}

impl fmt::Debug for SiteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteClient")
            .field("base_url", &self.base_url.as_str())
            .field("discriminator", &self.discriminator)
            .finish()
    }
}

impl SiteClient {
    pub fn new(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        let (base_url, discriminator) = split_site_url(url)?;
        Ok(Self {
            base_url,
            discriminator,
            fetcher,
            last_url: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `#` 뒤의 펀드/바스켓 식별자
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    /// 카탈로그에 저장되는 형태의 URL
    pub fn url(&self) -> String {
        match &self.discriminator {
            Some(id) => format!("{}#{}", self.base_url, id),
            None => self.base_url.to_string(),
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// 기본 URL 기준 상대 경로로 요청을 만듭니다.
    pub fn request(&self, path: &str) -> EtfResult<HttpRequest> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| EtfError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))?;
        Ok(HttpRequest::get(url))
    }

    /// 요청을 보내고 최종 URL을 기록합니다.
    pub async fn send(&self, request: HttpRequest) -> EtfResult<HttpResponse> {
        let response = self.fetcher.get(&request).await?;
        if let Ok(mut last_url) = self.last_url.lock() {
            *last_url = Some(response.url.clone());
        }
        Ok(response)
    }

    /// 홈페이지 HTML
    pub async fn homepage(&self) -> EtfResult<String> {
        let response = self.send(HttpRequest::get(self.base_url.clone())).await?;
        Ok(response.text().into_owned())
    }

    /// 마지막 응답의 최종 URL (리다이렉트 반영)
    pub fn last_response_url(&self) -> Option<Url> {
        self.last_url.lock().ok().and_then(|url| url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureFetcher;

    #[test]
    fn test_split_site_url() {
        let (base, id) = split_site_url("https://mofidsectorfund.com/#3").unwrap();
        assert_eq!(base.as_str(), "https://mofidsectorfund.com/");
        assert_eq!(id.as_deref(), Some("3"));

        let (base, id) = split_site_url("https://modirfund.ir/").unwrap();
        assert_eq!(base.as_str(), "https://modirfund.ir/");
        assert!(id.is_none());

        assert!(split_site_url("https://modirfund.ir").is_err());
        assert!(split_site_url("https://modirfund.ir#2").is_err());
        assert!(split_site_url("not a url/").is_err());
    }

    #[tokio::test]
    async fn test_send_records_last_url() {
        let fetcher = FixtureFetcher::new().redirect(
            "http://modirfund.ir/Fund/GetETFNAV",
            "https://www.modirfund.ir/Fund/GetETFNAV",
            "\"{}\"",
        );
        let client = SiteClient::new("http://modirfund.ir/", Arc::new(fetcher)).unwrap();
        assert!(client.last_response_url().is_none());

        let request = client.request("Fund/GetETFNAV").unwrap();
        client.send(request).await.unwrap();

        assert_eq!(
            client.last_response_url().unwrap().host_str(),
            Some("www.modirfund.ir")
        );
        assert_eq!(client.url(), "http://modirfund.ir/");
    }
}
