//! 라얀 하맙자 플랫폼.
//!
//! 단일 펀드 사이트는 펀드 ID를 경로 마지막 세그먼트로, 멀티 펀드 사이트는
//! `fundId` 쿠키로 전달합니다. 펀드 ID는 저장된 URL의 `#` 뒤에 옵니다.

use super::{parse_json, warn_unknown_labels, FundSite, SiteClient};
use crate::http::{Fetcher, HttpRequest};
use async_trait::async_trait;
use etf_core::{
    jalali_to_gregorian, json_f64, json_i64, parse_jalali, AssetAllocation, DividendRecord,
    EtfResult, LiveNavps, NavRecord, NavpsHistory, NavpsRecord, SiteType,
    JALALI_DATETIME, JALALI_DATETIME_MINUTES,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const API_PREFIX: &str = "api/data/";
const DEFAULT_FUND_ID: &str = "1";
const FUND_ID_COOKIE: &str = "fundId";

const KNOWN_LABELS: &[&str] = &[
    "DepositTodayPercent",
    "CashTodayPercent",
    "BondTodayPercent",
    "StockTodayPercent",
    "OtherAssetTodayPercent",
];

const CACHE_LABELS: &[&str] = &["DepositTodayPercent", "CashTodayPercent", "BondTodayPercent"];

/// 펀드 ID 전달 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FundIdMode {
    Path,
    Cookie,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LiveResponse {
    #[serde(rename = "SellNAVPerShare")]
    sell_nav_per_share: Value,
    #[serde(rename = "PurchaseNAVPerShare")]
    purchase_nav_per_share: Value,
    jalali_date: String,
    time: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HistoryRow {
    jalali_date: String,
    #[serde(rename = "SellNAVPerShare")]
    sell_nav_per_share: Value,
    #[serde(rename = "PurchaseNAVPerShare")]
    purchase_nav_per_share: Value,
    #[serde(rename = "StatisticalNAVPerShare", default)]
    statistical_nav_per_share: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PureAssetRow {
    pure_asset: Value,
    jalali_date: String,
    #[serde(rename = "PurchaseNAVPerShare")]
    purchase_nav_per_share: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProfitRow {
    profit_date: String,
    fund_unit: Value,
    unit_profit: Value,
    #[serde(rename = "SUMAllProfit")]
    sum_all_profit: Value,
}

/// 배당 응답은 배열이거나 `{data: [...]}` 형태입니다.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfitResponse {
    Rows(Vec<ProfitRow>),
    Wrapped { data: Vec<ProfitRow> },
}

impl ProfitResponse {
    fn into_rows(self) -> Vec<ProfitRow> {
        match self {
            Self::Rows(rows) | Self::Wrapped { data: rows } => rows,
        }
    }
}

/// 라얀 하맙자 어댑터 (단일/멀티 펀드).
#[derive(Debug)]
pub struct RayanHamafza {
    client: SiteClient,
    mode: FundIdMode,
}

impl RayanHamafza {
    /// 펀드 ID를 경로로 보내는 단일 펀드 사이트
    pub fn new(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        Ok(Self {
            client: SiteClient::new(url, fetcher)?,
            mode: FundIdMode::Path,
        })
    }

    /// 펀드 ID를 쿠키로 보내는 멀티 펀드 사이트
    pub fn multi_nav(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        Ok(Self {
            client: SiteClient::new(url, fetcher)?,
            mode: FundIdMode::Cookie,
        })
    }

    pub fn fund_id(&self) -> &str {
        self.client.discriminator().unwrap_or(DEFAULT_FUND_ID)
    }

    fn endpoint(&self, name: &str) -> EtfResult<HttpRequest> {
        match self.mode {
            FundIdMode::Path => self
                .client
                .request(&format!("{}{}/{}", API_PREFIX, name, self.fund_id())),
            FundIdMode::Cookie => Ok(self
                .client
                .request(&format!("{}{}", API_PREFIX, name))?
                .with_cookie(FUND_ID_COOKIE, self.fund_id())),
        }
    }

    async fn json<T: DeserializeOwned>(&self, name: &str) -> EtfResult<T> {
        let response = self.client.send(self.endpoint(name)?).await?;
        parse_json(&response.body)
    }

    /// 펀드 전체 순자산 이력
    pub async fn nav_history(&self) -> EtfResult<Vec<NavRecord>> {
        let rows: Vec<PureAssetRow> = self.json("PureAsset").await?;
        let mut records = rows
            .iter()
            .map(|row| {
                Ok(NavRecord {
                    date: parse_jalali(&row.jalali_date, "%Y/%m/%d")?.date(),
                    nav: json_f64(&row.pure_asset)?,
                    redemption: json_f64(&row.purchase_nav_per_share)?,
                })
            })
            .collect::<EtfResult<Vec<_>>>()?;
        records.sort_by_key(|record| record.date);
        Ok(records)
    }

    /// 포트폴리오 산업별 비중. 플랫폼이 보낸 행을 그대로 돌려줍니다.
    pub async fn portfolio_industries(&self) -> EtfResult<Vec<BTreeMap<String, Value>>> {
        self.json("Industries").await
    }
}

#[async_trait]
impl FundSite for RayanHamafza {
    fn site_type(&self) -> SiteType {
        match self.mode {
            FundIdMode::Path => SiteType::RayanHamafza,
            FundIdMode::Cookie => SiteType::RayanHamafzaMultiNav,
        }
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
        let live: LiveResponse = self.json("NavLight").await?;
        let timestamp = format!("{} {}", live.jalali_date.trim(), live.time.trim());
        let date = jalali_to_gregorian(&timestamp, &[JALALI_DATETIME, JALALI_DATETIME_MINUTES])?;

        let mut navps = LiveNavps::new(
            json_i64(&live.sell_nav_per_share)?,
            json_i64(&live.purchase_nav_per_share)?,
            date,
        );
        navps.extra = live.extra;
        Ok(navps)
    }

    async fn navps_history(&self) -> EtfResult<NavpsHistory> {
        let rows: Vec<HistoryRow> = self.json("NAVPerShare").await?;
        let records = rows
            .iter()
            .map(|row| {
                let statistical = match &row.statistical_nav_per_share {
                    Some(Value::Null) | None => None,
                    Some(value) => Some(json_f64(value)?),
                };
                Ok(NavpsRecord::new(
                    parse_jalali(&row.jalali_date, "%Y/%m/%d")?.date(),
                    json_f64(&row.sell_nav_per_share)?,
                    json_f64(&row.purchase_nav_per_share)?,
                    statistical,
                ))
            })
            .collect::<EtfResult<Vec<_>>>()?;
        Ok(NavpsHistory::from_records(records))
    }

    async fn asset_allocation(&self) -> EtfResult<AssetAllocation> {
        let mix: BTreeMap<String, Value> = self.json("MixAsset").await?;

        // JalaliDate 같은 숫자가 아닌 항목은 분류가 아니다
        let allocation: AssetAllocation = mix
            .into_iter()
            .filter_map(|(label, value)| match value {
                Value::Number(n) => n.as_f64().map(|percent| (label, percent / 100.0)),
                _ => None,
            })
            .collect();

        warn_unknown_labels(self, &allocation);
        Ok(allocation)
    }

    async fn dividend_history(&self) -> EtfResult<Vec<DividendRecord>> {
        let response: ProfitResponse = self.json("Profit").await?;
        let mut records = response
            .into_rows()
            .iter()
            .map(|row| {
                Ok(DividendRecord {
                    date: parse_jalali(&row.profit_date, "%Y/%m/%d")?.date(),
                    fund_units: json_i64(&row.fund_unit)?,
                    unit_profit: json_f64(&row.unit_profit)?,
                    total_profit: json_f64(&row.sum_all_profit)?,
                    profit_percent: None,
                })
            })
            .collect::<EtfResult<Vec<_>>>()?;
        records.sort_by_key(|record| record.date);
        Ok(records)
    }
}
