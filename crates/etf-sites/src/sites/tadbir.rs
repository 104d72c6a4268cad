//! 타드비르 파르다즈 플랫폼.
//!
//! 실시간 API는 JSON 문자열 안에 JSON을 한 번 더 인코딩해서 돌려주므로 두 번 디코딩합니다.
//! 멀티 바스켓 사이트는 모든 요청 쿼리의 마지막에 `basketId`를 붙입니다.
//! 배당 이력은 페이지가 나뉜 HTML 보고서에서 읽습니다.

use super::{
    leverage_ratio, parse_gregorian_date, parse_json, unsupported, warn_unknown_labels, FundSite,
    SiteClient,
};
use crate::http::{Fetcher, HttpRequest};
use async_trait::async_trait;
use chrono::NaiveDate;
use etf_core::{
    comma_float, comma_int, gregorian_to_jalali, jalali_to_gregorian, json_f64, json_i64,
    persian_digits_to_ascii, AssetAllocation, DividendRecord, EtfError, EtfResult, LiveNavps,
    NavpsHistory, NavpsRecord, SiteType, UnitClassNavps, JALALI_DATE, JALALI_DATETIME,
};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const BASKET_ID: &str = "basketId";

const KNOWN_LABELS: &[&str] = &[
    "اوراق گواهی سپرده",
    "اوراق مشارکت",
    "پنج سهم برتر",
    "سایر دارایی\u{200c}ها",
    "سایر سهام",
    "سایر سهم\u{200c}ها",
    "سهم\u{200c}های برتر",
    "شمش و طلا",
    "صندوق سرمایه\u{200c}گذاری در سهام",
    "صندوق های سرمایه گذاری",
    "قرارداد آتی",
    "مطالبات",
    "وجه نقد",
    "سپرده بانکی",
    "اختیار معامله",
];

const CACHE_LABELS: &[&str] = &["اوراق گواهی سپرده", "اوراق مشارکت", "وجه نقد", "سپرده بانکی"];

const VERSION_LABEL: &str = "version number:";

/// 배당 보고서 한 행의 최소 셀 수
const DIVIDEND_CELLS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Plain,
    MultiNav,
    Leveraged,
}

#[derive(Debug, Deserialize)]
struct ChartSeries {
    #[serde(rename = "List")]
    list: Vec<ChartPoint>,
}

#[derive(Debug, Deserialize)]
struct ChartPoint {
    x: Value,
    y: Value,
}

/// 홈페이지에서 읽은 플랫폼 설정.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TadbirHomeInfo {
    pub is_etf_multi_nav_mode: bool,
    pub is_etf_mode: bool,
    pub is_leveraged_mode: bool,
    /// `(바스켓 ID, 이름)`, 페이지에 나온 순서
    pub baskets: Vec<(String, String)>,
    pub reg_no: Option<String>,
    pub version: Option<String>,
}

impl TadbirHomeInfo {
    /// 홈페이지 HTML에서 설정을 읽습니다. 찾지 못한 항목은 기본값으로 둡니다.
    pub fn parse(html: &str) -> Self {
        Self {
            is_etf_multi_nav_mode: parse_flag(html, "isETFMultiNavMode"),
            is_etf_mode: parse_flag(html, "isEtfMode"),
            is_leveraged_mode: parse_flag(html, "isLeveragedMode"),
            baskets: parse_baskets(html),
            reg_no: parse_reg_no(html),
            version: parse_version(html),
        }
    }

    pub fn first_basket(&self) -> Option<&str> {
        self.baskets.first().map(|(id, _)| id.as_str())
    }
}

/// `name = true`, `"name": "True"` 같은 플래그 값
fn parse_flag(html: &str, name: &str) -> bool {
    let pattern = format!(
        r#"(?i){}["']?\s*[:=]\s*["']?(true|false)"#,
        regex::escape(name)
    );
    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(html))
        .map(|caps| caps[1].eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_baskets(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut baskets = Vec::new();
    if let Ok(option_selector) = Selector::parse("select#basketIDs option") {
        for option in document.select(&option_selector) {
            if let Some(id) = option.value().attr("value").map(str::trim) {
                if !id.is_empty() {
                    let name = option.text().collect::<String>().trim().to_string();
                    baskets.push((id.to_string(), name));
                }
            }
        }
    }
    baskets
}

fn parse_reg_no(html: &str) -> Option<String> {
    Regex::new(r"seo_reg_no[^\d<]{0,40}(\d+)")
        .ok()?
        .captures(html)
        .map(|caps| caps[1].to_string())
}

fn parse_version(html: &str) -> Option<String> {
    let start = html.find(VERSION_LABEL)? + VERSION_LABEL.len();
    let token = html[start..]
        .split(|c| c == '<' || c == '\n')
        .next()?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// 배당 보고서 한 페이지: 행과 다음 페이지 링크
fn parse_dividend_page(html: &str) -> EtfResult<(Vec<DividendRecord>, Option<String>)> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    if let Ok(tr_selector) = Selector::parse("table tbody tr") {
        if let Ok(td_selector) = Selector::parse("td") {
            for tr in document.select(&tr_selector) {
                let cells: Vec<String> = tr
                    .select(&td_selector)
                    .map(|td| persian_digits_to_ascii(td.text().collect::<String>().trim()))
                    .collect();
                // "데이터 없음" 같은 안내 행은 건너뜀
                if cells.len() < DIVIDEND_CELLS {
                    continue;
                }
                records.push(parse_dividend_row(&cells)?);
            }
        }
    }

    let next = Selector::parse(r#"li.PagedList-skipToNext a[href], a[rel="next"]"#)
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .find_map(|a| a.value().attr("href").map(str::to_string))
        });

    Ok((records, next))
}

/// `[행 번호, 분배일, 단위 수, 단위당 분배액, 총 분배액, 분배율]`
fn parse_dividend_row(cells: &[String]) -> EtfResult<DividendRecord> {
    let percent = cells[5].trim_end_matches('%').trim();
    Ok(DividendRecord {
        date: jalali_to_gregorian(&cells[1], &[JALALI_DATETIME, JALALI_DATE])?.date(),
        fund_units: comma_int(&cells[2])?,
        unit_profit: comma_float(&cells[3])?,
        total_profit: comma_float(&cells[4])?,
        profit_percent: if percent.is_empty() {
            None
        } else {
            Some(comma_float(percent)?)
        },
    })
}

fn take(map: &mut BTreeMap<String, Value>, key: &str) -> EtfResult<Value> {
    map.remove(key)
        .ok_or_else(|| EtfError::Json(format!("missing field `{}`", key)))
}

fn take_str(map: &mut BTreeMap<String, Value>, key: &str) -> EtfResult<String> {
    match take(map, key)? {
        Value::String(s) => Ok(s),
        other => Err(EtfError::Json(format!("`{}` is not a string: {}", key, other))),
    }
}

/// 차트 시리즈 하나를 날짜별 값으로 읽습니다.
fn series_by_date(series: &ChartSeries) -> EtfResult<BTreeMap<NaiveDate, f64>> {
    series
        .list
        .iter()
        .map(|point| Ok((point_date(point)?, json_f64(&point.y)?)))
        .collect()
}

fn point_date(point: &ChartPoint) -> EtfResult<NaiveDate> {
    match &point.x {
        Value::String(s) => parse_gregorian_date(s),
        other => Err(EtfError::Parse(format!("chart date is not a string: {}", other))),
    }
}

/// 타드비르 파르다즈 어댑터 (일반/멀티 바스켓/레버리지).
#[derive(Debug)]
pub struct TadbirPardaz {
    client: SiteClient,
    variant: Variant,
}

impl TadbirPardaz {
    pub fn new(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        Ok(Self {
            client: SiteClient::new(url, fetcher)?,
            variant: Variant::Plain,
        })
    }

    /// 멀티 바스켓 사이트. URL에 `#바스켓ID`가 있어야 합니다.
    pub fn multi_nav(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        let client = SiteClient::new(url, fetcher)?;
        if client.discriminator().is_none() {
            return Err(EtfError::InvalidUrl(format!("{} (basket id required)", url)));
        }
        Ok(Self {
            client,
            variant: Variant::MultiNav,
        })
    }

    pub fn leveraged(url: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Self> {
        Ok(Self {
            client: SiteClient::new(url, fetcher)?,
            variant: Variant::Leveraged,
        })
    }

    /// 멀티 바스켓 사이트의 바스켓 ID
    pub fn basket_id(&self) -> Option<&str> {
        match self.variant {
            Variant::MultiNav => self.client.discriminator(),
            _ => None,
        }
    }

    fn request(&self, path: &str, query: &[(&str, &str)]) -> EtfResult<HttpRequest> {
        let mut request = self.client.request(path)?;
        for (key, value) in query {
            request = request.with_query(*key, *value);
        }
        if let Some(basket_id) = self.basket_id() {
            request = request.with_query(BASKET_ID, basket_id);
        }
        Ok(request)
    }

    async fn json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> EtfResult<T> {
        let response = self.client.send(self.request(path, query)?).await?;
        parse_json(&response.body)
    }

    /// JSON 문자열로 한 번 더 감싸진 객체를 디코딩합니다.
    async fn double_encoded(&self, path: &str) -> EtfResult<BTreeMap<String, Value>> {
        let inner: String = self.json(path, &[]).await?;
        Ok(serde_json::from_str(&inner)?)
    }

    async fn chart_series(&self) -> EtfResult<Vec<ChartSeries>> {
        self.json("Chart/TotalNAV", &[("type", "getnavtotal")]).await
    }

    /// 홈페이지 설정 (플래그, 바스켓 목록, 등록 번호, 버전)
    pub async fn home_info(&self) -> EtfResult<TadbirHomeInfo> {
        let html = self.client.homepage().await?;
        Ok(TadbirHomeInfo::parse(&html))
    }

    /// 기간을 지정한 배당 이력. 다음 페이지 링크가 없을 때까지 따라갑니다.
    pub async fn dividend_history_between(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> EtfResult<Vec<DividendRecord>> {
        let from = from.map(|d| gregorian_to_jalali(d).to_string());
        let to = to.map(|d| gregorian_to_jalali(d).to_string());
        let mut query = Vec::new();
        if let Some(from) = from.as_deref() {
            query.push(("fromDate", from));
        }
        if let Some(to) = to.as_deref() {
            query.push(("toDate", to));
        }

        let mut request = self.request("Reports/FundDividendProfitReport", &query)?;
        let mut visited = HashSet::new();
        let mut records = Vec::new();

        loop {
            let page_url = request.full_url();
            visited.insert(page_url.to_string());

            let response = self.client.send(request).await?;
            let (rows, next) = parse_dividend_page(&response.text())?;
            tracing::debug!(url = %page_url, rows = rows.len(), "배당 보고서 페이지");
            records.extend(rows);

            let Some(href) = next else { break };
            let mut next_url = page_url
                .join(&href)
                .map_err(|e| EtfError::InvalidUrl(format!("{}: {}", href, e)))?;
            // 페이지 링크에는 바스켓 식별자가 빠져 있을 수 있음
            if let Some(basket_id) = self.basket_id() {
                if !next_url.query_pairs().any(|(key, _)| key == BASKET_ID) {
                    next_url.query_pairs_mut().append_pair(BASKET_ID, basket_id);
                }
            }
            if visited.contains(next_url.as_str()) {
                tracing::warn!(url = %next_url, "이미 읽은 배당 보고서 페이지, 중단");
                break;
            }
            request = HttpRequest::get(next_url);
        }

        Ok(records)
    }

    fn leveraged_series(series: &[ChartSeries]) -> EtfResult<[&ChartSeries; 5]> {
        match series {
            [a, b, c, d, e, ..] => Ok([a, b, c, d, e]),
            _ => Err(EtfError::Json(format!(
                "leveraged chart needs 5 series, got {}",
                series.len()
            ))),
        }
    }

    async fn leveraged_history(&self) -> EtfResult<NavpsHistory> {
        let series = self.chart_series().await?;
        let [common_creation, common_statistical, common_redemption, creation, redemption] =
            Self::leveraged_series(&series)?;

        let common_creation = series_by_date(common_creation)?;
        let common_statistical = series_by_date(common_statistical)?;
        let common_redemption = series_by_date(common_redemption)?;
        let redemption = series_by_date(redemption)?;

        let records = series_by_date(creation)?
            .into_iter()
            .filter_map(|(date, creation)| {
                let redemption = *redemption.get(&date)?;
                let mut record = NavpsRecord::new(date, creation, redemption, None);
                record.common = match (common_creation.get(&date), common_redemption.get(&date)) {
                    (Some(&c), Some(&r)) => Some(UnitClassNavps {
                        creation: c,
                        redemption: r,
                        statistical: common_statistical.get(&date).copied(),
                    }),
                    _ => None,
                };
                Some(record)
            })
            .collect();

        Ok(NavpsHistory::from_records(records))
    }

    async fn plain_history(&self) -> EtfResult<NavpsHistory> {
        let series = self.chart_series().await?;
        let [creation, statistical, redemption] = match series.as_slice() {
            [a, b, c, ..] => [a, b, c],
            _ => {
                return Err(EtfError::Json(format!(
                    "chart needs 3 series, got {}",
                    series.len()
                )))
            }
        };

        let records = creation
            .list
            .iter()
            .zip(&statistical.list)
            .zip(&redemption.list)
            .map(|((c, s), r)| {
                let statistical = match &s.y {
                    Value::Null => None,
                    y => Some(json_f64(y)?),
                };
                Ok(NavpsRecord::new(
                    point_date(c)?,
                    json_f64(&c.y)?,
                    json_f64(&r.y)?,
                    statistical,
                ))
            })
            .collect::<EtfResult<Vec<_>>>()?;

        Ok(NavpsHistory::from_records(records))
    }
}

#[async_trait]
impl FundSite for TadbirPardaz {
    fn site_type(&self) -> SiteType {
        match self.variant {
            Variant::Plain => SiteType::TadbirPardaz,
            Variant::MultiNav => SiteType::TadbirPardazMultiNav,
            Variant::Leveraged => SiteType::LeveragedTadbirPardaz,
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
        let (path, creation_key, redemption_key, date_key) = match self.variant {
            Variant::Leveraged => (
                "Fund/GetLeveragedNAV",
                "SuperUnitsSubscriptionNAV",
                "SuperUnitsCancelNAV",
                "PublishDate",
            ),
            _ => ("Fund/GetETFNAV", "subNav", "cancelNav", "publishDate"),
        };

        let mut fields = self.double_encoded(path).await?;
        let creation = json_i64(&take(&mut fields, creation_key)?)?;
        let redemption = json_i64(&take(&mut fields, redemption_key)?)?;
        let date = jalali_to_gregorian(
            &take_str(&mut fields, date_key)?,
            &[JALALI_DATETIME, JALALI_DATE],
        )?;

        let mut navps = LiveNavps::new(creation, redemption, date);
        navps.extra = fields;
        Ok(navps)
    }

    async fn navps_history(&self) -> EtfResult<NavpsHistory> {
        match self.variant {
            Variant::Leveraged => self.leveraged_history().await,
            _ => self.plain_history().await,
        }
    }

    async fn asset_allocation(&self) -> EtfResult<AssetAllocation> {
        let series: ChartSeries = self.json("Chart/AssetCompositions", &[]).await?;
        let allocation = series
            .list
            .iter()
            .map(|point| {
                let label = match &point.x {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                };
                Ok((label, json_f64(&point.y)? / 100.0))
            })
            .collect::<EtfResult<AssetAllocation>>()?;

        warn_unknown_labels(self, &allocation);
        Ok(allocation)
    }

    async fn version(&self) -> EtfResult<String> {
        self.home_info()
            .await?
            .version
            .ok_or_else(|| EtfError::Parse(format!("version not found at {}", self.url())))
    }

    async fn leverage(&self) -> EtfResult<f64> {
        if self.variant != Variant::Leveraged {
            return Err(unsupported(self.site_type(), "leverage"));
        }
        let (live, cache) = tokio::try_join!(self.live_navps(), self.cache())?;
        let field = |key: &str| {
            live.extra_f64(key)
                .ok_or_else(|| EtfError::Parse(format!("missing `{}` in leveraged NAV", key)))
        };
        leverage_ratio(
            field("BaseUnitsTotalNetAssetValue")?,
            field("SuperUnitsTotalNetAssetValue")?,
            cache,
        )
    }

    async fn dividend_history(&self) -> EtfResult<Vec<DividendRecord>> {
        self.dividend_history_between(None, None).await
    }

    async fn reg_no(&self) -> EtfResult<String> {
        self.home_info()
            .await?
            .reg_no
            .ok_or_else(|| EtfError::Parse(format!("seo_reg_no not found at {}", self.url())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureFetcher;
    use crate::sites::test_support::capture_warnings;

    fn double_encode(inner: &str) -> String {
        serde_json::to_string(inner).unwrap()
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_live_navps_double_encoded() {
        let body = double_encode(
            r#"{"subNav":"12,345","cancelNav":"12,000","publishDate":"1402/05/01 10:15:00","nominal":"10,000"}"#,
        );
        let fetcher = FixtureFetcher::new().route("https://modirfund.ir/Fund/GetETFNAV", body);
        let site = TadbirPardaz::new("https://modirfund.ir/", Arc::new(fetcher)).unwrap();

        let live = site.live_navps().await.unwrap();
        assert_eq!(live.creation, 12345);
        assert_eq!(live.redemption, 12000);
        assert_eq!(live.date, datetime(2023, 7, 23, 10, 15, 0));
        assert_eq!(live.extra_f64("nominal"), Some(10000.0));
        assert!(!live.extra.contains_key("subNav"));
        assert!(live.is_spread_consistent());
        assert_eq!(site.live_navps().await.unwrap(), live);
    }

    #[tokio::test]
    async fn test_live_date_only_fallback() {
        let body = double_encode(r#"{"subNav":"5,010","cancelNav":"4,990","publishDate":"1402/05/01 "}"#);
        let fetcher = FixtureFetcher::new().route("https://modirfund.ir/Fund/GetETFNAV", body);
        let site = TadbirPardaz::new("https://modirfund.ir/", Arc::new(fetcher)).unwrap();

        let live = site.live_navps().await.unwrap();
        assert_eq!(live.date, datetime(2023, 7, 23, 0, 0, 0));
    }

    #[tokio::test]
    async fn test_single_encoded_body_is_rejected() {
        let body = r#"{"subNav":"12,345","cancelNav":"12,000","publishDate":"1402/05/01 10:15:00"}"#;
        let fetcher = FixtureFetcher::new().route("https://modirfund.ir/Fund/GetETFNAV", body);
        let site = TadbirPardaz::new("https://modirfund.ir/", Arc::new(fetcher)).unwrap();

        assert!(matches!(site.live_navps().await, Err(EtfError::Json(_))));
    }

    #[tokio::test]
    async fn test_multi_nav_appends_basket_id() {
        let live = double_encode(r#"{"subNav":"1,100","cancelNav":"1,090","publishDate":"1402/05/01 10:15:00"}"#);
        let chart = r#"[
            {"List":[{"x":"2023-07-23T00:00:00","y":1100}]},
            {"List":[{"x":"2023-07-23T00:00:00","y":1095}]},
            {"List":[{"x":"2023-07-23T00:00:00","y":1090}]}
        ]"#;
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .route("https://mofidsectorfund.com/Fund/GetETFNAV?basketId=3", live)
                .route(
                    "https://mofidsectorfund.com/Chart/TotalNAV?type=getnavtotal&basketId=3",
                    chart,
                ),
        );
        let site = TadbirPardaz::multi_nav("https://mofidsectorfund.com/#3", fetcher.clone())
            .unwrap();

        assert_eq!(site.basket_id(), Some("3"));
        assert_eq!(site.site_type(), SiteType::TadbirPardazMultiNav);
        assert_eq!(site.live_navps().await.unwrap().creation, 1100);
        assert_eq!(site.navps_history().await.unwrap().len(), 1);
        assert_eq!(
            fetcher.requested_urls(),
            vec![
                "https://mofidsectorfund.com/Fund/GetETFNAV?basketId=3",
                "https://mofidsectorfund.com/Chart/TotalNAV?type=getnavtotal&basketId=3",
            ]
        );
    }

    #[test]
    fn test_multi_nav_requires_basket() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(FixtureFetcher::new());
        assert!(TadbirPardaz::multi_nav("https://mofidsectorfund.com/", fetcher).is_err());
    }

    #[tokio::test]
    async fn test_navps_history() {
        let chart = r#"[
            {"List":[{"x":"7/24/2023 12:00:00 AM","y":12400},{"x":"7/23/2023 12:00:00 AM","y":12345}]},
            {"List":[{"x":"7/24/2023 12:00:00 AM","y":12200},{"x":"7/23/2023 12:00:00 AM","y":null}]},
            {"List":[{"x":"7/24/2023 12:00:00 AM","y":12050},{"x":"7/23/2023 12:00:00 AM","y":12000}]}
        ]"#;
        let fetcher = FixtureFetcher::new()
            .route("https://modirfund.ir/Chart/TotalNAV?type=getnavtotal", chart);
        let site = TadbirPardaz::new("https://modirfund.ir/", Arc::new(fetcher)).unwrap();

        let history = site.navps_history().await.unwrap();
        assert_eq!(history.len(), 2);
        let first = history.first().unwrap();
        assert_eq!(first.date, date(2023, 7, 23));
        assert_eq!((first.creation, first.redemption), (12345.0, 12000.0));
        assert_eq!(first.statistical, None);
        assert_eq!(history.get(date(2023, 7, 24)).unwrap().statistical, Some(12200.0));
    }

    #[tokio::test]
    async fn test_leveraged_live_history_and_leverage() {
        let live = double_encode(
            r#"{"SuperUnitsSubscriptionNAV":"20,500","SuperUnitsCancelNAV":"20,300","PublishDate":"1402/05/01 10:15:00","BaseUnitsTotalNetAssetValue":"3,000,000","SuperUnitsTotalNetAssetValue":"1,000,000"}"#,
        );
        let chart = r#"[
            {"List":[{"x":"2023-07-23","y":10100},{"x":"2023-07-24","y":10200}]},
            {"List":[{"x":"2023-07-23","y":10050},{"x":"2023-07-24","y":10150}]},
            {"List":[{"x":"2023-07-23","y":10000},{"x":"2023-07-24","y":10100}]},
            {"List":[{"x":"2023-07-23","y":20500}]},
            {"List":[{"x":"2023-07-23","y":20300}]},
            {"List":[{"x":"2023-07-23","y":1}]}
        ]"#;
        let allocation = r#"{"List":[
            {"x":"وجه نقد","y":10},{"x":"سپرده بانکی","y":15},{"x":"سایر سهام","y":75}
        ]}"#;
        let fetcher = FixtureFetcher::new()
            .route("https://leveraged.example.ir/Fund/GetLeveragedNAV", live)
            .route("https://leveraged.example.ir/Chart/TotalNAV?type=getnavtotal", chart)
            .route("https://leveraged.example.ir/Chart/AssetCompositions", allocation);
        let site = TadbirPardaz::leveraged("https://leveraged.example.ir/", Arc::new(fetcher))
            .unwrap();

        let navps = site.live_navps().await.unwrap();
        assert_eq!((navps.creation, navps.redemption), (20500, 20300));
        assert!(navps.is_spread_consistent());

        let history = site.navps_history().await.unwrap();
        assert_eq!(history.len(), 1);
        let record = history.first().unwrap();
        assert_eq!(record.creation, 20500.0);
        let common = record.common.unwrap();
        assert_eq!((common.creation, common.redemption), (10100.0, 10000.0));
        assert_eq!(common.statistical, Some(10050.0));

        // (1 + 3) × (1 − 0.25)
        let leverage = site.leverage().await.unwrap();
        assert!((leverage - 3.0).abs() < 1e-10);
    }

    #[tokio::test]
    async fn test_plain_site_has_no_leverage() {
        let site = TadbirPardaz::new("https://modirfund.ir/", Arc::new(FixtureFetcher::new()))
            .unwrap();
        assert!(matches!(site.leverage().await, Err(EtfError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_asset_allocation_known_labels() {
        let body = r#"{"List":[
            {"x":"اوراق گواهی سپرده","y":20},
            {"x":"اوراق مشارکت","y":30},
            {"x":"وجه نقد","y":5},
            {"x":"سپرده بانکی","y":25},
            {"x":"سایر دارایی‌ها","y":2.5},
            {"x":"سهم‌های برتر","y":17.5}
        ]}"#;
        let fetcher =
            FixtureFetcher::new().route("https://modirfund.ir/Chart/AssetCompositions", body);
        let site = TadbirPardaz::new("https://modirfund.ir/", Arc::new(fetcher)).unwrap();

        let (warnings, _guard) = capture_warnings();
        let allocation = site.asset_allocation().await.unwrap();
        assert!((allocation.sum() - 1.0).abs() < 1e-10);
        assert_eq!(warnings.count(), 0);
        assert!((site.cache().await.unwrap() - 0.8).abs() < 1e-10);
    }

    #[tokio::test]
    async fn test_unknown_label_warns() {
        let body = r#"{"List":[{"x":"وجه نقد","y":50},{"x":"رمزارز","y":50}]}"#;
        let fetcher =
            FixtureFetcher::new().route("https://modirfund.ir/Chart/AssetCompositions", body);
        let site = TadbirPardaz::new("https://modirfund.ir/", Arc::new(fetcher)).unwrap();

        let (warnings, _guard) = capture_warnings();
        let allocation = site.asset_allocation().await.unwrap();
        assert!(allocation.contains("رمزارز"));
        assert_eq!(warnings.count(), 1);
    }

    const HOMEPAGE: &str = r#"<html><head>
        <script>
            var isETFMultiNavMode = true;
            var isEtfMode = 'True';
            var isLeveragedMode = false;
        </script>
        <meta name="seo_reg_no" content="12150">
        </head><body>
        <select id="basketIDs">
            <option value="3">صندوق بخشی خودرو</option>
            <option value="4">صندوق بخشی فلزات</option>
        </select>
        <div class="tadbirLogo"></div>
        <footer>version number: 9.2.5</footer>
        </body></html>"#;

    #[test]
    fn test_home_info_parse() {
        let info = TadbirHomeInfo::parse(HOMEPAGE);
        assert!(info.is_etf_multi_nav_mode);
        assert!(info.is_etf_mode);
        assert!(!info.is_leveraged_mode);
        assert_eq!(info.first_basket(), Some("3"));
        assert_eq!(info.baskets.len(), 2);
        assert_eq!(info.baskets[1].1, "صندوق بخشی فلزات");
        assert_eq!(info.reg_no.as_deref(), Some("12150"));
        assert_eq!(info.version.as_deref(), Some("9.2.5"));

        let empty = TadbirHomeInfo::parse("<html></html>");
        assert_eq!(empty, TadbirHomeInfo::default());
    }

    #[tokio::test]
    async fn test_version_and_reg_no() {
        let fetcher = FixtureFetcher::new().route("https://modirfund.ir/", HOMEPAGE);
        let site = TadbirPardaz::new("https://modirfund.ir/", Arc::new(fetcher)).unwrap();

        assert_eq!(site.version().await.unwrap(), "9.2.5");
        assert_eq!(site.reg_no().await.unwrap(), "12150");
    }

    fn dividend_page(rows: &[(&str, &str)], next: Option<&str>) -> String {
        let body: String = rows
            .iter()
            .enumerate()
            .map(|(i, (date, units))| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>۴۵۰</td><td>450,000,000</td><td>1.8%</td></tr>",
                    i + 1,
                    date,
                    units
                )
            })
            .collect();
        let pager = next
            .map(|href| {
                format!(
                    r#"<ul class="pagination"><li class="PagedList-skipToNext"><a href="{}">»</a></li></ul>"#,
                    href
                )
            })
            .unwrap_or_default();
        format!(
            "<html><body><table><thead><tr><th>ردیف</th></tr></thead><tbody>{}</tbody></table>{}</body></html>",
            body, pager
        )
    }

    #[tokio::test]
    async fn test_dividend_pagination_stops_without_next() {
        let page1 = dividend_page(
            &[("1402/01/31", "1,000,000"), ("1402/02/31", "1,000,000")],
            Some("/Reports/FundDividendProfitReport?page=2"),
        );
        let page2 = dividend_page(
            &[
                ("1402/03/31", "1,100,000"),
                ("1402/04/31", "1,100,000"),
                ("1402/05/31", "1,200,000"),
            ],
            Some("/Reports/FundDividendProfitReport?page=3"),
        );
        let page3 = dividend_page(&[("1402/06/31", "1,200,000")], None);

        let fetcher = Arc::new(
            FixtureFetcher::new()
                .route("https://modirfund.ir/Reports/FundDividendProfitReport", page1)
                .route("https://modirfund.ir/Reports/FundDividendProfitReport?page=2", page2)
                .route("https://modirfund.ir/Reports/FundDividendProfitReport?page=3", page3),
        );
        let site = TadbirPardaz::new("https://modirfund.ir/", fetcher.clone()).unwrap();

        let dividends = site.dividend_history().await.unwrap();
        assert_eq!(dividends.len(), 2 + 3 + 1);
        assert_eq!(fetcher.requests().len(), 3);

        let first = &dividends[0];
        assert_eq!(first.date, date(2023, 4, 20));
        assert_eq!(first.fund_units, 1_000_000);
        assert_eq!(first.unit_profit, 450.0);
        assert_eq!(first.total_profit, 450_000_000.0);
        assert_eq!(first.profit_percent, Some(1.8));
    }

    #[tokio::test]
    async fn test_multi_basket_dividend_pages_keep_basket() {
        let page1 = dividend_page(
            &[("1402/01/31", "1,000,000"), ("1402/02/31", "1,000,000")],
            Some("?page=2"),
        );
        let page2 = dividend_page(&[("1402/03/31", "1,100,000")], None);

        let fetcher = Arc::new(
            FixtureFetcher::new()
                .route(
                    "https://mofidsectorfund.com/Reports/FundDividendProfitReport?basketId=3",
                    page1,
                )
                .route(
                    "https://mofidsectorfund.com/Reports/FundDividendProfitReport?page=2&basketId=3",
                    page2,
                ),
        );
        let site = TadbirPardaz::multi_nav("https://mofidsectorfund.com/#3", fetcher.clone())
            .unwrap();

        let dividends = site.dividend_history().await.unwrap();
        assert_eq!(dividends.len(), 3);
        assert_eq!(dividends[2].fund_units, 1_100_000);
        assert_eq!(
            fetcher.requested_urls(),
            vec![
                "https://mofidsectorfund.com/Reports/FundDividendProfitReport?basketId=3",
                "https://mofidsectorfund.com/Reports/FundDividendProfitReport?page=2&basketId=3",
            ]
        );
    }

    #[tokio::test]
    async fn test_dividend_date_range_and_loop_guard() {
        let page = dividend_page(
            &[("1402/05/01", "990,000")],
            Some("/Reports/FundDividendProfitReport?fromDate=1402%2F01%2F01&toDate=1402%2F12%2F29"),
        );
        let fetcher = Arc::new(FixtureFetcher::new().route(
            "https://modirfund.ir/Reports/FundDividendProfitReport?fromDate=1402%2F01%2F01&toDate=1402%2F12%2F29",
            page,
        ));
        let site = TadbirPardaz::new("https://modirfund.ir/", fetcher.clone()).unwrap();

        let dividends = site
            .dividend_history_between(Some(date(2023, 3, 21)), Some(date(2024, 3, 19)))
            .await
            .unwrap();
        assert_eq!(dividends.len(), 1);
        assert_eq!(dividends[0].date, date(2023, 7, 23));
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[test]
    fn test_dividend_page_skips_short_rows() {
        let html = "<table><tbody><tr><td colspan=\"6\">اطلاعاتی یافت نشد</td></tr></tbody></table>";
        let (rows, next) = parse_dividend_page(html).unwrap();
        assert!(rows.is_empty());
        assert!(next.is_none());
    }
}
