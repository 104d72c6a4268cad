//! 마브나 DP 레버리지 펀드 플랫폼 (v2 API).
//!
//! 모든 요청에 `portfolio_id` 쿼리가 필요합니다. 값은 URL의 `#` 뒤 또는 기본값 `1`입니다.
//! 레버리지 배율과 등록 번호는 홈페이지에 심어진 클라이언트 상태(`window.__...__`)에서 읽습니다.

use super::{
    leverage_ratio, parse_iso_datetime, parse_json, warn_unknown_labels, FundSite, SiteClient,
};
use crate::http::Fetcher;
use async_trait::async_trait;
use etf_core::{
    json_f64, json_i64, AssetAllocation, EtfError, EtfResult, LiveNavps, NavpsHistory,
    NavpsRecord, SiteType,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const API_PREFIX: &str = "api/v2/public/fund/";
const PORTFOLIO_ID: &str = "portfolio_id";
const DEFAULT_PORTFOLIO_ID: &str = "1";

const QUERY_STATE: &str = "__REACT_QUERY_STATE__";
const REDUX_STATE: &str = "__REACT_REDUX_STATE__";
const ENV: &str = "__ENV__";

const KNOWN_LABELS: &[&str] = &[
    "سهام",
    "وجه نقد",
    "سپرده بانکی",
    "اوراق با درآمد ثابت",
    "صندوق های سرمایه گذاری",
    "سایر دارایی ها",
    "اختیار معامله",
    "سایر",
];

const CACHE_LABELS: &[&str] = &["وجه نقد", "سپرده بانکی", "اوراق با درآمد ثابت"];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct LiveData {
    date_time: String,
    purchase_price: Value,
    redemption_price: Value,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    date_time: String,
    purchase_price: Value,
    redemption_price: Value,
    #[serde(default)]
    statistical_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AssetClass {
    title: String,
    percentage: Value,
}

/// 홈페이지에 심어진 클라이언트 애플리케이션 상태.
#[derive(Debug, Clone, PartialEq)]
pub struct MabnaHomeData {
    pub react_query_state: Value,
    pub react_redux_state: Value,
    pub env: Value,
}

impl MabnaHomeData {
    pub fn parse(html: &str) -> EtfResult<Self> {
        Ok(Self {
            react_query_state: window_state(html, QUERY_STATE)?,
            react_redux_state: window_state(html, REDUX_STATE)?,
            env: window_state(html, ENV)?,
        })
    }

    /// 쿼리 캐시에서 보통/우선 단위 순자산 총액을 찾습니다.
    pub fn unit_net_asset_values(&self) -> Option<(f64, f64)> {
        let queries = self.react_query_state.get("queries")?.as_array()?;
        queries.iter().find_map(|query| {
            let data = query.get("state")?.get("data")?;
            std::iter::once(data)
                .chain(data.get("data"))
                .find_map(|candidate| {
                    let common = json_f64(candidate.get("common_unit_total_net_asset_value")?).ok()?;
                    let preferred =
                        json_f64(candidate.get("preferred_unit_total_net_asset_value")?).ok()?;
                    Some((common, preferred))
                })
        })
    }

    pub fn registration_number(&self) -> Option<String> {
        match self
            .react_redux_state
            .get("general")?
            .get("fund")?
            .get("registration_number")?
        {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// `window.NAME = "<JSON 문자열>"` 형태의 값을 찾아 두 번 디코딩합니다.
fn window_state(html: &str, name: &str) -> EtfResult<Value> {
    let missing = || EtfError::Parse(format!("window.{} not found", name));
    let marker = format!("window.{}", name);
    let start = html.find(&marker).ok_or_else(missing)? + marker.len();
    let rest = &html[start..];
    let assign = rest.find('=').ok_or_else(missing)?;

    let mut literals =
        serde_json::Deserializer::from_str(rest[assign + 1..].trim_start()).into_iter::<String>();
    let encoded = literals.next().ok_or_else(missing)??;
    Ok(serde_json::from_str(&encoded)?)
}

/// 마브나 DP 레버리지 어댑터.
#[derive(Debug)]
pub struct LeveragedMabnaDp {
    client: SiteClient,
}

impl LeveragedMabnaDp {
    pub fn new(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        Ok(Self {
            client: SiteClient::new(url, fetcher)?,
        })
    }

    pub fn portfolio_id(&self) -> &str {
        self.client.discriminator().unwrap_or(DEFAULT_PORTFOLIO_ID)
    }

    async fn data<T: DeserializeOwned>(&self, path: &str) -> EtfResult<T> {
        let request = self
            .client
            .request(&format!("{}{}", API_PREFIX, path))?
            .with_query(PORTFOLIO_ID, self.portfolio_id());
        let response = self.client.send(request).await?;
        let envelope: Envelope<T> = parse_json(&response.body)?;
        Ok(envelope.data)
    }

    /// 홈페이지의 클라이언트 상태
    pub async fn home_data(&self) -> EtfResult<MabnaHomeData> {
        let html = self.client.homepage().await?;
        MabnaHomeData::parse(&html)
    }
}

#[async_trait]
impl FundSite for LeveragedMabnaDp {
    fn site_type(&self) -> SiteType {
        SiteType::LeveragedMabnaDp
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
        let live: LiveData = self.data("etf/navps/latest").await?;
        let mut navps = LiveNavps::new(
            json_i64(&live.purchase_price)?,
            json_i64(&live.redemption_price)?,
            parse_iso_datetime(&live.date_time)?,
        );
        navps.extra = live.extra;
        Ok(navps)
    }

    async fn navps_history(&self) -> EtfResult<NavpsHistory> {
        let rows: Vec<HistoryRow> = self.data("etf/navps/history").await?;
        let records = rows
            .iter()
            .map(|row| {
                let statistical = match &row.statistical_value {
                    Some(Value::Null) | None => None,
                    Some(value) => Some(json_f64(value)?),
                };
                Ok(NavpsRecord::new(
                    parse_iso_datetime(&row.date_time)?.date(),
                    json_f64(&row.purchase_price)?,
                    json_f64(&row.redemption_price)?,
                    statistical,
                ))
            })
            .collect::<EtfResult<Vec<_>>>()?;
        Ok(NavpsHistory::from_records(records))
    }

    async fn asset_allocation(&self) -> EtfResult<AssetAllocation> {
        let classes: Vec<AssetClass> = self.data("asset-classes").await?;
        let allocation = classes
            .iter()
            .map(|class| Ok((class.title.trim().to_string(), json_f64(&class.percentage)? / 100.0)))
            .collect::<EtfResult<AssetAllocation>>()?;

        warn_unknown_labels(self, &allocation);
        Ok(allocation)
    }

    async fn leverage(&self) -> EtfResult<f64> {
        let (home, cache) = tokio::try_join!(self.home_data(), self.cache())?;
        let (common, preferred) = home.unit_net_asset_values().ok_or_else(|| {
            EtfError::Parse(format!("unit net asset values not found at {}", self.url()))
        })?;
        leverage_ratio(common, preferred, cache)
    }

    async fn reg_no(&self) -> EtfResult<String> {
        self.home_data()
            .await?
            .registration_number()
            .ok_or_else(|| EtfError::Parse(format!("registration number not found at {}", self.url())))
    }
}
