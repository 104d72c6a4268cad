//! 카탈로그 갱신/검사 통합 테스트
//!
//! 임시 디렉터리의 CSV 저장소, 가짜 등록부/종목 서비스, 고정 응답 fetcher로
//! 전체 갱신 흐름을 실행합니다.

use async_trait::async_trait;
use etf_catalog::{
    Catalog, CsvDatasetStore, DatasetStore, FundRegistry, Instrument, InstrumentService,
    Reconciler, RegistryFund,
};
use etf_core::{AppConfig, EtfError, EtfResult, FundRecord, FundType, SiteType};
use etf_sites::{Fetcher, FixtureFetcher};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// 고정 등록부
struct FakeRegistry(Vec<RegistryFund>);

#[async_trait]
impl FundRegistry for FakeRegistry {
    async fn funds(&self) -> EtfResult<Vec<RegistryFund>> {
        Ok(self.0.clone())
    }
}

/// 고정 검색 결과와 시장 목록
#[derive(Default)]
struct FakeInstruments {
    search: HashMap<String, Vec<Instrument>>,
    feed: Option<Vec<Instrument>>,
}

#[async_trait]
impl InstrumentService for FakeInstruments {
    async fn search(&self, name: &str) -> EtfResult<Vec<Instrument>> {
        Ok(self.search.get(name).cloned().unwrap_or_default())
    }

    async fn etf_instruments(&self) -> EtfResult<Vec<Instrument>> {
        self.feed
            .clone()
            .ok_or_else(|| EtfError::Collaborator("market feed unavailable".to_string()))
    }
}

fn fund(reg_no: &str, name: &str, code: i64, website: Option<&str>) -> RegistryFund {
    RegistryFund {
        reg_no: reg_no.to_string(),
        name: name.to_string(),
        fund_type_code: code,
        type_of_invest: "Negotiable".to_string(),
        is_completed: true,
        website: website.map(str::to_string),
    }
}

fn instrument(l18: &str, name: &str, code: &str) -> Instrument {
    Instrument {
        l18: l18.to_string(),
        name: name.to_string(),
        instrument_code: code.to_string(),
        fund_type: None,
    }
}

fn tadbir_live() -> String {
    serde_json::to_string(
        r#"{"subNav":"12,345","cancelNav":"12,000","publishDate":"1402/05/01 10:15:00"}"#,
    )
    .unwrap()
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.probe.max_attempts = 1;
    config
}

struct Harness {
    _dir: TempDir,
    store: Arc<CsvDatasetStore>,
}

impl Harness {
    fn new(rows: &[FundRecord]) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CsvDatasetStore::new(dir.path().join("data").join("dataset.csv")));
        if !rows.is_empty() {
            store.save(rows).unwrap();
        }
        Self { _dir: dir, store }
    }

    fn reconciler(
        &self,
        registry: Vec<RegistryFund>,
        instruments: FakeInstruments,
        fetcher: FixtureFetcher,
    ) -> Reconciler {
        let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);
        Reconciler::new(
            self.store.clone(),
            Arc::new(FakeRegistry(registry)),
            Arc::new(instruments),
            fetcher,
            test_config(),
        )
    }

    fn rows(&self) -> Vec<FundRecord> {
        self.store.load().unwrap()
    }
}

fn scenario_instruments() -> FakeInstruments {
    let mut search = HashMap::new();
    search.insert(
        "صندوق کیان".to_string(),
        vec![instrument("کیان", "صندوق کیان", "IRT1KIAN0001")],
    );
    // 이름이 같은 결과가 하나여도 전체 결과가 두 건이면 확정하지 않음
    search.insert(
        "صندوق مشابه".to_string(),
        vec![
            instrument("مشابه", "صندوق مشابه", "IRT1MSBH0001"),
            instrument("مشابه۲", "صندوق مشابه ۲", "IRT1MSBH0002"),
        ],
    );
    search.insert(
        "صندوق دوقلو".to_string(),
        vec![
            instrument("دوقلو", "صندوق دوقلو", "IRT1DQLO0001"),
            instrument("دوقلو۲", "صندوق دوقلو", "IRT1DQLO0002"),
        ],
    );
    FakeInstruments {
        search,
        feed: Some(Vec::new()),
    }
}

fn scenario_registry() -> Vec<RegistryFund> {
    vec![
        fund("11477", "صندوق کیان", 6, Some("kian.ir")),
        fund("11500", "صندوق گمشده", 4, None),
        fund("11600", "صندوق دوقلو", 7, None),
        fund("11700", "صندوق مشابه", 6, None),
    ]
}

#[tokio::test]
async fn test_new_fund_with_single_hit_is_appended() {
    let harness = Harness::new(&[]);
    let fetcher = FixtureFetcher::new().route("https://kian.ir/Fund/GetETFNAV", tadbir_live());
    let reconciler = harness.reconciler(scenario_registry(), scenario_instruments(), fetcher);

    let report = reconciler.update_dataset(false).await.unwrap();

    assert_eq!(report.stats.appended, 1);
    assert_eq!(report.stats.probed, 1);
    assert_eq!(report.stats.detected, 1);

    let rows = harness.rows();
    assert_eq!(rows.len(), 1);
    let kian = &rows[0];
    assert_eq!(kian.l18, "کیان");
    assert_eq!(kian.name, "صندوق کیان");
    assert_eq!(kian.fund_type, FundType::Stock);
    assert_eq!(kian.instrument_code.as_deref(), Some("IRT1KIAN0001"));
    assert_eq!(kian.registration_number.as_deref(), Some("11477"));
    assert_eq!(kian.url.as_deref(), Some("https://kian.ir/"));
    assert_eq!(kian.adapter_type, Some(SiteType::TadbirPardaz));

    // 검색 결과 0건, 2건은 반환 목록으로
    let unrecognized: Vec<(&str, Option<usize>)> = report
        .unrecognized
        .iter()
        .map(|fund| (fund.entry.reg_no.as_str(), fund.matches))
        .collect();
    assert_eq!(
        unrecognized,
        vec![("11500", Some(0)), ("11600", Some(2)), ("11700", Some(2))]
    );
    assert_eq!(report.stats.unrecognized, 3);
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let harness = Harness::new(&[]);
    let fetcher = || FixtureFetcher::new().route("https://kian.ir/Fund/GetETFNAV", tadbir_live());

    harness
        .reconciler(scenario_registry(), scenario_instruments(), fetcher())
        .update_dataset(false)
        .await
        .unwrap();
    let first = std::fs::read(harness.store.path()).unwrap();

    let report = harness
        .reconciler(scenario_registry(), scenario_instruments(), fetcher())
        .update_dataset(false)
        .await
        .unwrap();
    let second = std::fs::read(harness.store.path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(report.stats.appended, 0);
    assert_eq!(report.stats.merged, 1);
    // 이미 알려진 도메인은 다시 탐색하지 않음
    assert_eq!(report.stats.probed, 0);
}

#[tokio::test]
async fn test_multi_fund_row_is_not_reclassified() {
    let mut multi = FundRecord::new("چندگانه", "صندوق قدیم", FundType::Stock);
    multi.instrument_code = Some("IRT1MULT0001".to_string());
    multi.registration_number = Some("2".to_string());
    multi.url = Some("https://multi.ir/#3".to_string());
    multi.adapter_type = Some(SiteType::TadbirPardazMultiNav);
    let harness = Harness::new(&[multi]);

    let fetcher = FixtureFetcher::new().route("https://other.ir/Fund/GetETFNAV", tadbir_live());
    let registry = vec![fund("2", "صندوق چندگانه", 7, Some("other.ir"))];
    let report = harness
        .reconciler(registry, FakeInstruments::default(), fetcher)
        .update_dataset(false)
        .await
        .unwrap();

    assert_eq!(report.stats.detected, 1);
    let rows = harness.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "صندوق چندگانه");
    assert_eq!(rows[0].fund_type, FundType::Mixed);
    assert_eq!(rows[0].url.as_deref(), Some("https://multi.ir/#3"));
    assert_eq!(rows[0].adapter_type, Some(SiteType::TadbirPardazMultiNav));
}

#[tokio::test]
async fn test_market_feed_overwrites_by_instrument_code() {
    let mut row = FundRecord::new("قدیم", "نام قدیم", FundType::Stock);
    row.instrument_code = Some("IRT1FEED0001".to_string());
    row.registration_number = Some("1".to_string());
    let harness = Harness::new(&[row.clone()]);

    let mut fresh = instrument("جدید", "صندوق جدید", "IRT1FEED0001");
    fresh.fund_type = Some(FundType::Fixed);
    let instruments = FakeInstruments {
        feed: Some(vec![fresh]),
        ..FakeInstruments::default()
    };
    let registry = vec![fund("1", "نام ثبتی", 6, None)];
    harness
        .reconciler(registry.clone(), instruments, FixtureFetcher::new())
        .update_dataset(false)
        .await
        .unwrap();

    let rows = harness.rows();
    assert_eq!(rows[0].l18, "جدید");
    assert_eq!(rows[0].name, "صندوق جدید");
    assert_eq!(rows[0].fund_type, FundType::Fixed);

    // 시장 목록이 실패해도 갱신은 계속됨
    let failing = Harness::new(&[row]);
    let report = failing
        .reconciler(registry, FakeInstruments::default(), FixtureFetcher::new())
        .update_dataset(false)
        .await
        .unwrap();
    assert_eq!(report.stats.failures, 1);
    let rows = failing.rows();
    assert_eq!(rows[0].l18, "قدیم");
    assert_eq!(rows[0].name, "نام ثبتی");
}

#[tokio::test]
async fn test_existing_instrument_gets_registration_number() {
    let mut row = FundRecord::new("نه", "صندوق نه", FundType::Stock);
    row.instrument_code = Some("IRT1NINE0001".to_string());
    let harness = Harness::new(&[row]);

    let mut search = HashMap::new();
    search.insert(
        "صندوق نه".to_string(),
        vec![instrument("نه", "صندوق نه", "IRT1NINE0001")],
    );
    let instruments = FakeInstruments {
        search,
        feed: Some(Vec::new()),
    };
    let report = harness
        .reconciler(vec![fund("9", "صندوق نه", 6, None)], instruments, FixtureFetcher::new())
        .update_dataset(false)
        .await
        .unwrap();

    assert_eq!(report.stats.appended, 0);
    assert!(report.unrecognized.is_empty());
    let rows = harness.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].registration_number.as_deref(), Some("9"));
}

fn site_row(l18: &str, url: &str, site_type: SiteType) -> FundRecord {
    let mut row = FundRecord::new(l18, format!("صندوق {}", l18), FundType::Stock);
    row.instrument_code = Some(format!("IRT1{}", l18.to_uppercase()));
    row.url = Some(url.to_string());
    row.adapter_type = Some(site_type);
    row
}

#[tokio::test]
async fn test_check_dataset_reports_drift() {
    let rows = vec![
        site_row("a", "https://a.ir/", SiteType::TadbirPardaz),
        site_row("b", "https://b.ir/", SiteType::MabnaDp),
        site_row("c", "https://c.ir/#2", SiteType::RayanHamafzaMultiNav),
        site_row("d", "https://d.ir/", SiteType::MabnaDp),
        site_row("e", "https://e.ir/", SiteType::RayanHamafza),
        FundRecord::new("f", "صندوق f", FundType::Fixed),
    ];
    let harness = Harness::new(&rows);

    let fetcher = FixtureFetcher::new()
        .route(
            "https://a.ir/",
            r#"<html><script>var isLeveragedMode = true;</script><div class="tadbirLogo"></div></html>"#,
        )
        .route(
            "https://b.ir/",
            r#"<html><a href="https://mabnadp.com">Mabna</a></html>"#,
        )
        .route("https://c.ir/", "<footer>Rayan Ham Afza</footer>")
        .route("https://d.ir/", "<html>maintenance</html>");
    let reconciler = harness.reconciler(Vec::new(), FakeInstruments::default(), fetcher);

    let report = reconciler.check_dataset(true).await.unwrap();

    assert!(report.violations.is_empty());
    assert_eq!(report.stats.checked, 5);
    assert_eq!(report.drift.len(), 2);
    assert_eq!(report.drift[0].l18, "a");
    assert_eq!(report.drift[0].recorded, SiteType::TadbirPardaz);
    assert_eq!(report.drift[0].detected, Some(SiteType::LeveragedTadbirPardaz));
    assert_eq!(report.drift[1].l18, "d");
    assert_eq!(report.drift[1].detected, None);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "e");
    assert_eq!(report.without_site, vec!["f".to_string()]);
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_check_dataset_offline_only_checks_invariants() {
    let mut duplicate = site_row("b", "https://b.ir/", SiteType::MabnaDp);
    duplicate.name = "صندوق a".to_string();
    let mut broken = FundRecord::new("c", "صندوق c", FundType::Stock);
    broken.adapter_type = Some(SiteType::MabnaDp);
    let harness = Harness::new(&[site_row("a", "https://a.ir/", SiteType::MabnaDp), duplicate, broken]);

    let fetcher = FixtureFetcher::new();
    let reconciler = harness.reconciler(Vec::new(), FakeInstruments::default(), fetcher);
    let report = reconciler.check_dataset(false).await.unwrap();

    assert_eq!(report.violations.len(), 2);
    assert_eq!(report.stats.checked, 0);
    assert!(report.drift.is_empty());
    assert_eq!(report.without_site, vec!["c".to_string()]);

    let catalog = Catalog::new(harness.rows());
    assert_eq!(catalog.violations(), report.violations);
}
