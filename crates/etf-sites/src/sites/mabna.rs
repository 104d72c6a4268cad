//! 마브나 DP 플랫폼 (v1 API).
//!
//! - `api/v1/overall/navetf.json`: 실시간 가격, 날짜는 `HH:MM YYYY/MM/DD` 잘랄리
//! - `api/v1/overall/navps.json`: 가격 이력, 날짜는 `YYYYMMDD000000` 잘랄리
//! - `api/v1/overall/dailyvalue.json?portfolioIds=0`: 자산 배분 (백분율)

use super::{parse_json, warn_unknown_labels, FundSite, SiteClient};
use crate::http::Fetcher;
use async_trait::async_trait;
use etf_core::{
    json_f64, json_i64, parse_jalali, AssetAllocation, EtfError, EtfResult, LiveNavps,
    NavpsHistory, NavpsRecord, SiteType,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const API_PREFIX: &str = "api/v1/overall/";

const KNOWN_LABELS: &[&str] = &[
    "سهام",
    "سایر دارایی ها",
    "وجه نقد",
    "سایر",
    "سپرده بانکی",
    "اوراق بهادار با درآمد ثابت",
];

const CACHE_LABELS: &[&str] = &["وجه نقد", "سپرده بانکی"];

/// 버전 앞에 오는 라벨. 사이트 개정에 따라 둘 중 하나가 쓰입니다.
const VERSION_LABELS: &[&str] = &["نگارش ", "نسخه "];

#[derive(Debug, Deserialize)]
struct LiveResponse {
    date_time: String,
    purchase_price: Value,
    redemption_price: Value,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct HistorySeries {
    values: Vec<HistoryRow>,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    date: Value,
    purchase_price: Value,
    // 원본 API의 철자 그대로
    redeption_price: Value,
    #[serde(default)]
    statistical_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AllocationResponse {
    values: Vec<AllocationRow>,
}

#[derive(Debug, Deserialize)]
struct AllocationRow {
    name: String,
    percentage: Value,
}

/// 마브나 DP 어댑터.
#[derive(Debug)]
pub struct MabnaDp {
    client: SiteClient,
}

impl MabnaDp {
    pub fn new(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        Ok(Self {
            client: SiteClient::new(url, fetcher)?,
        })
    }

    async fn json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> EtfResult<T> {
        let mut request = self.client.request(&format!("{}{}", API_PREFIX, path))?;
        for (key, value) in query {
            request = request.with_query(*key, *value);
        }
        let response = self.client.send(request).await?;
        parse_json(&response.body)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 홈페이지에서 버전 라벨 뒤의 토큰을 찾습니다 (다음 `<`까지).
pub(crate) fn parse_version(html: &str) -> Option<String> {
    VERSION_LABELS.iter().find_map(|label| {
        let start = html.find(label)? + label.len();
        let token = html[start..].split('<').next()?.trim();
        (!token.is_empty()).then(|| token.to_string())
    })
}

#[async_trait]
impl FundSite for MabnaDp {
    fn site_type(&self) -> SiteType {
        SiteType::MabnaDp
    }

    fn client(&self) -> &SiteClient {
        &self.client
    }

    fn known_labels(&self) -> &'static [&'static str] {
        KNOWN_LABELS
    }

    fn cache_labels(&self) -> &'static [&'static str] {
        CACHE_LABELS
    }

    async fn live_navps(&self) -> EtfResult<LiveNavps> {
        let live: LiveResponse = self.json("navetf.json", &[]).await?;
        let date = parse_jalali(&live.date_time, "%H:%M %Y/%m/%d")?;
        let mut navps = LiveNavps::new(
            json_i64(&live.purchase_price)?,
            json_i64(&live.redemption_price)?,
            date,
        );
        navps.extra = live.extra;
        Ok(navps)
    }

    async fn navps_history(&self) -> EtfResult<NavpsHistory> {
        let series: Vec<HistorySeries> = self.json("navps.json", &[]).await?;
        let rows = series
            .into_iter()
            .next()
            .ok_or_else(|| EtfError::Json("empty navps series".to_string()))?
            .values;

        let records = rows
            .iter()
            .map(|row| {
                let date = parse_jalali(&value_text(&row.date), "%Y%m%d000000")?.date();
                let statistical = match &row.statistical_value {
                    Some(Value::Null) | None => None,
                    Some(value) => Some(json_f64(value)?),
                };
                Ok(NavpsRecord::new(
                    date,
                    json_f64(&row.purchase_price)?,
                    json_f64(&row.redeption_price)?,
                    statistical,
                ))
            })
            .collect::<EtfResult<Vec<_>>>()?;

        Ok(NavpsHistory::from_records(records))
    }

    async fn asset_allocation(&self) -> EtfResult<AssetAllocation> {
        let response: AllocationResponse = self
            .json("dailyvalue.json", &[("portfolioIds", "0")])
            .await?;

        let allocation = response
            .values
            .iter()
            .map(|row| Ok((row.name.trim().to_string(), json_f64(&row.percentage)? / 100.0)))
            .collect::<EtfResult<AssetAllocation>>()?;

        warn_unknown_labels(self, &allocation);
        Ok(allocation)
    }

    async fn version(&self) -> EtfResult<String> {
        let html = self.client.homepage().await?;
        parse_version(&html)
            .ok_or_else(|| EtfError::Parse(format!("version label not found at {}", self.url())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureFetcher;
    use crate::sites::test_support::capture_warnings;
    use chrono::NaiveDate;

    const BASE: &str = "https://kianfunds6.ir/";

    const LIVE: &str = r#"{
        "date_time": "10:15 1402/05/01",
        "purchase_price": "12,345",
        "redemption_price": "12,000",
        "statistical_price": 12100.5,
        "unit_count": 1500000
    }"#;

    const HISTORY: &str = r#"[{"values": [
        {"date": 14020502000000, "purchase_price": 12400, "redeption_price": 12050, "statistical_value": 12200.0},
        {"date": "14020501000000", "purchase_price": 12345, "redeption_price": 12000, "statistical_value": null}
    ]}]"#;

    const ALLOCATION: &str = r#"{"values": [
        {"name": "سهام", "percentage": 62.5},
        {"name": "وجه نقد", "percentage": 7.5},
        {"name": "سپرده بانکی", "percentage": 20},
        {"name": "اوراق بهادار با درآمد ثابت", "percentage": 5},
        {"name": "سایر دارایی ها", "percentage": 3},
        {"name": "سایر", "percentage": 2}
    ]}"#;

    fn site(fetcher: FixtureFetcher) -> MabnaDp {
        MabnaDp::new(BASE, Arc::new(fetcher)).unwrap()
    }

    #[tokio::test]
    async fn test_live_navps() {
        let fetcher = FixtureFetcher::new()
            .route("https://kianfunds6.ir/api/v1/overall/navetf.json", LIVE);
        let site = site(fetcher);

        let live = site.live_navps().await.unwrap();
        assert_eq!(live.creation, 12345);
        assert_eq!(live.redemption, 12000);
        assert_eq!(
            live.date,
            NaiveDate::from_ymd_opt(2023, 7, 23)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap()
        );
        assert_eq!(live.extra_f64("unit_count"), Some(1_500_000.0));
        assert!(live.is_spread_consistent());

        // 같은 입력이면 결과도 같다
        assert_eq!(site.live_navps().await.unwrap(), live);
    }

    #[tokio::test]
    async fn test_navps_history() {
        let fetcher = FixtureFetcher::new()
            .route("https://kianfunds6.ir/api/v1/overall/navps.json", HISTORY);

        let history = site(fetcher).navps_history().await.unwrap();
        assert_eq!(history.len(), 2);
        let first = history.first().unwrap();
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 7, 23).unwrap());
        assert_eq!(first.creation, 12345.0);
        assert_eq!(first.redemption, 12000.0);
        assert_eq!(first.statistical, None);
        assert_eq!(history.last().unwrap().statistical, Some(12200.0));
    }

    #[tokio::test]
    async fn test_asset_allocation_and_cache() {
        let fetcher = FixtureFetcher::new().route(
            "https://kianfunds6.ir/api/v1/overall/dailyvalue.json?portfolioIds=0",
            ALLOCATION,
        );
        let site = site(fetcher);

        let (warnings, _guard) = capture_warnings();
        let allocation = site.asset_allocation().await.unwrap();
        assert!((allocation.sum() - 1.0).abs() < 1e-10);
        assert!(allocation.unknown_labels(KNOWN_LABELS).is_empty());
        assert_eq!(warnings.count(), 0);

        let cache = site.cache().await.unwrap();
        assert!((cache - 0.275).abs() < 1e-10);
    }

    #[tokio::test]
    async fn test_unknown_label_warns() {
        let body = r#"{"values": [
            {"name": "سهام", "percentage": 90},
            {"name": "طلا", "percentage": 10}
        ]}"#;
        let fetcher = FixtureFetcher::new().route(
            "https://kianfunds6.ir/api/v1/overall/dailyvalue.json?portfolioIds=0",
            body,
        );

        let (warnings, _guard) = capture_warnings();
        let allocation = site(fetcher).asset_allocation().await.unwrap();
        assert!((allocation.get("طلا") - 0.1).abs() < 1e-12);
        assert_eq!(warnings.count(), 1);
    }

    #[tokio::test]
    async fn test_version_labels() {
        let new_page = "<footer><span>نگارش 2.15</span></footer>";
        let old_page = "<footer><p>نسخه 2.15</p></footer>";

        for page in [new_page, old_page] {
            let fetcher = FixtureFetcher::new().route(BASE, page);
            assert_eq!(site(fetcher).version().await.unwrap(), "2.15");
        }

        let fetcher = FixtureFetcher::new().route(BASE, "<html></html>");
        assert!(site(fetcher).version().await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_price() {
        let body = r#"{"date_time": "10:15 1402/05/01", "purchase_price": "N/A", "redemption_price": "12,000"}"#;
        let fetcher = FixtureFetcher::new()
            .route("https://kianfunds6.ir/api/v1/overall/navetf.json", body);

        let err = site(fetcher).live_navps().await.unwrap_err();
        assert!(matches!(err, EtfError::Parse(_)));
    }
}
