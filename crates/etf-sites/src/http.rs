//! HTTP 전송 계층.
//!
//! 어댑터는 `Fetcher` 트레이트만 알고, 실제 전송은 `ReqwestFetcher`가 담당합니다.
//! 타임아웃과 TLS 검증 여부는 `HttpConfig`로 생성 시점에 정해집니다.

use async_trait::async_trait;
use etf_core::{EtfError, EtfResult, HttpConfig};
use reqwest::header::COOKIE;
use reqwest::{redirect, Client};
use std::borrow::Cow;
use url::Url;

/// GET 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: Url,
    /// 순서가 유지되는 쿼리 파라미터
    pub query: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            query: Vec::new(),
            cookies: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// 쿼리 파라미터가 붙은 전체 URL
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        url
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// 응답. `url`은 리다이렉트를 따라간 최종 URL입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub url: Url,
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// URL에서 바이트를 가져오는 기능.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET 요청을 보냅니다. 2xx가 아니면 `EtfError::Status`를 반환합니다.
    async fn get(&self, request: &HttpRequest) -> EtfResult<HttpResponse>;
}

/// reqwest 기반 fetcher.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    config: HttpConfig,
}

impl ReqwestFetcher {
    pub fn new(config: HttpConfig) -> EtfResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .timeout(config.total_timeout())
            .redirect(redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| EtfError::Config(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// TLS 검증 여부만 바꾼 별도의 fetcher를 만듭니다.
    ///
    /// 원래 fetcher는 그대로 남으므로, 검증을 끈 fetcher는 그것이 필요한 범위에서만 쓰입니다.
    pub fn with_tls_verification(&self, verify: bool) -> EtfResult<Self> {
        if verify == self.config.verify_tls {
            return Ok(self.clone());
        }
        let mut config = self.config.clone();
        config.verify_tls = verify;
        Self::new(config)
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn get(&self, request: &HttpRequest) -> EtfResult<HttpResponse> {
        let mut builder = self.client.get(request.url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }

        tracing::debug!(url = %request.full_url(), "GET");
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();

        if !status.is_success() {
            return Err(EtfError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(HttpResponse {
            url,
            status: status.as_u16(),
            body,
        })
    }
}
