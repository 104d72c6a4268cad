//! 고정 응답을 돌려주는 fetcher.
//!
//! 어댑터 파서와 감지 로직을 네트워크 없이 검증할 때 씁니다.
//! 등록되지 않은 URL은 연결 실패로 응답합니다.

use crate::http::{Fetcher, HttpRequest, HttpResponse};
use async_trait::async_trait;
use etf_core::{EtfError, EtfResult};
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
enum Route {
    Body { final_url: Option<Url>, body: Vec<u8> },
    Status(u16),
}

/// URL(쿼리·쿠키 포함)별 고정 응답과 요청 기록.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    routes: HashMap<String, Route>,
    flaky: Mutex<HashMap<String, u32>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn route_key(url: &str, cookie: Option<&str>) -> String {
    match cookie {
        Some(cookie) => format!("{} cookie:{}", url, cookie),
        None => url.to_string(),
    }
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `url`(쿼리 포함 전체 URL)에 본문을 등록합니다.
    pub fn route(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(
            route_key(url, None),
            Route::Body {
                final_url: None,
                body: body.into(),
            },
        );
        self
    }

    /// 특정 쿠키(`name=value`)가 붙은 요청에만 응답하는 본문을 등록합니다.
    pub fn route_with_cookie(mut self, url: &str, cookie: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(
            route_key(url, Some(cookie)),
            Route::Body {
                final_url: None,
                body: body.into(),
            },
        );
        self
    }

    /// 리다이렉트 후 `final_url`에서 응답한 것처럼 등록합니다.
    pub fn redirect(mut self, url: &str, final_url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(
            route_key(url, None),
            Route::Body {
                final_url: Url::parse(final_url).ok(),
                body: body.into(),
            },
        );
        self
    }

    /// HTTP 에러 상태를 등록합니다.
    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(route_key(url, None), Route::Status(status));
        self
    }

    /// 처음 `failures`번은 연결 실패, 그 뒤로는 본문을 돌려주도록 등록합니다.
    pub fn flaky(mut self, url: &str, failures: u32, body: impl Into<Vec<u8>>) -> Self {
        let key = route_key(url, None);
        if let Ok(flaky) = self.flaky.get_mut() {
            flaky.insert(key, failures);
        }
        self.route(url, body)
    }

    /// 지금까지 받은 요청.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// 지금까지 받은 요청의 전체 URL.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| request.full_url().to_string())
            .collect()
    }

    fn take_failure(&self, key: &str) -> bool {
        let Ok(mut flaky) = self.flaky.lock() else {
            return false;
        };
        match flaky.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn get(&self, request: &HttpRequest) -> EtfResult<HttpResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let url = request.full_url();
        let cookie = request
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        let key = route_key(url.as_str(), (!cookie.is_empty()).then_some(cookie.as_str()));

        if self.take_failure(&key) {
            return Err(EtfError::Network(format!("connection reset: {}", url)));
        }

        match self.routes.get(&key) {
            Some(Route::Body { final_url, body }) => Ok(HttpResponse {
                url: final_url.clone().unwrap_or(url),
                status: 200,
                body: body.clone(),
            }),
            Some(Route::Status(status)) => Err(EtfError::Status {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(EtfError::Network(format!("connect: {}", url))),
        }
    }
}
