//! 카탈로그 조정 엔진.
//!
//! 한 번의 갱신은 다음 순서로 진행됩니다.
//!
//! 1. 카탈로그 로드
//! 2. 등록부 조회 후 필터/유형 변환
//! 3. 새 도메인의 사이트 유형 탐색
//! 4. 등록 번호로 기존 행에 병합
//! 5. 신규 펀드 식별
//! 6. 이름 검색으로 종목 코드 확인
//! 7. 시장 종목 목록으로 덮어쓰기
//! 8. 신규 행 추가 (코드를 못 찾은 펀드는 호출자에게 반환)
//! 9. 저장

use crate::catalog::{Catalog, Violation};
use crate::sources::{FundRegistry, Instrument, InstrumentService, RegistryFund};
use crate::stats::{CheckStats, UpdateStats};
use crate::store::DatasetStore;
use etf_core::{AppConfig, CatalogConfig, EtfError, EtfResult, FundRecord, FundType, SiteType};
use etf_sites::{
    from_url, normalize_domain, probe_domains, same_domain, Fetcher, FundSite, ProbeResult,
};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// 필터와 유형 변환을 거친 등록부 행.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub reg_no: String,
    pub name: String,
    pub fund_type: FundType,
    pub website: Option<String>,
}

/// 종목 코드를 찾지 못한 신규 펀드.
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedFund {
    pub entry: RegistryEntry,
    /// 이름 검색 결과 수 (검색 실패 시 `None`)
    pub matches: Option<usize>,
}

/// 갱신 결과.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    /// 수동 확인이 필요한 신규 펀드
    pub unrecognized: Vec<UnrecognizedFund>,
    pub stats: UpdateStats,
}

/// 기록된 어댑터 유형과 다시 판별한 유형이 다른 행.
#[derive(Debug, Clone, PartialEq)]
pub struct Drift {
    pub l18: String,
    pub url: String,
    pub recorded: SiteType,
    /// 어느 플랫폼으로도 판별되지 않으면 `None`
    pub detected: Option<SiteType>,
}

/// 검사 결과.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub violations: Vec<Violation>,
    pub drift: Vec<Drift>,
    /// 판별 중 에러가 난 행 (l18, 에러)
    pub failures: Vec<(String, String)>,
    /// 사이트가 지정되지 않은 행의 l18
    pub without_site: Vec<String>,
    pub stats: CheckStats,
}

impl CheckReport {
    /// 위반과 드리프트가 모두 없는지 확인합니다.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.drift.is_empty()
    }
}

enum Resolution {
    Found(Instrument),
    Ambiguous(usize),
    Failed,
}

/// 등록부 행을 거래 가능/완료/비제외 펀드로 거르고 카탈로그 유형으로 바꿉니다.
///
/// 매핑되지 않은 유형 코드는 경고 후 건너뜁니다.
pub fn select_registry(
    funds: Vec<RegistryFund>,
    config: &CatalogConfig,
    stats: &mut UpdateStats,
) -> Vec<RegistryEntry> {
    funds
        .into_iter()
        .filter(|fund| {
            fund.type_of_invest == config.negotiable_invest_type
                && fund.is_completed
                && !config.is_excluded(fund.fund_type_code)
        })
        .filter_map(|fund| match config.fund_type_for(fund.fund_type_code) {
            Some(fund_type) => Some(RegistryEntry {
                reg_no: fund.reg_no,
                name: fund.name.trim().to_string(),
                fund_type,
                website: fund.website.filter(|site| !site.trim().is_empty()),
            }),
            None => {
                tracing::warn!(
                    reg_no = %fund.reg_no,
                    code = fund.fund_type_code,
                    "알 수 없는 펀드 유형 코드, 건너뜀"
                );
                stats.skipped += 1;
                None
            }
        })
        .collect()
}

/// 탐색이 필요한 도메인을 고릅니다.
///
/// 같은 등록 번호의 기존 행이 이미 같은 도메인을 가리키면 `check_existing`이 아닌 한 건너뜁니다.
pub fn domains_to_probe(
    catalog: &Catalog,
    entries: &[RegistryEntry],
    check_existing: bool,
) -> Vec<String> {
    let mut domains = BTreeSet::new();
    for entry in entries {
        let Some(website) = entry.website.as_deref() else {
            continue;
        };
        let known = catalog
            .find_registration(&entry.reg_no)
            .and_then(|row| row.url.as_deref())
            .is_some_and(|url| same_domain(url, website));
        if known && !check_existing {
            continue;
        }
        let domain = normalize_domain(website);
        if !domain.is_empty() {
            domains.insert(domain);
        }
    }
    domains.into_iter().collect()
}

/// 등록부 값을 기존 행에 병합합니다.
///
/// 이름과 유형은 등록부 값을 따릅니다. URL과 어댑터는 탐색 결과가 있을 때만 바꾸며,
/// 수동 분류된 다중 펀드 행은 유지합니다.
pub fn merge_entry(row: &mut FundRecord, entry: &RegistryEntry, detection: Option<&ProbeResult>) {
    row.name = entry.name.clone();
    row.fund_type = entry.fund_type;

    let manual = row.adapter_type.is_some_and(|site_type| site_type.is_multi_fund());
    if let Some(found) = detection {
        if manual {
            tracing::debug!(l18 = %row.l18, "다중 펀드 행, 탐색 결과 무시");
        } else {
            row.url = Some(found.url.clone());
            row.adapter_type = Some(found.site_type);
        }
    }
}

/// 시장 종목 정보로 l18/이름/유형을 덮어씁니다.
fn apply_instrument(row: &mut FundRecord, feed: &HashMap<String, Instrument>) -> bool {
    let Some(instrument) = row.instrument_code.as_ref().and_then(|code| feed.get(code)) else {
        return false;
    };
    row.l18 = instrument.l18.clone();
    row.name = instrument.name.clone();
    if let Some(fund_type) = instrument.fund_type {
        row.fund_type = fund_type;
    }
    true
}

/// 검색 결과가 정확히 한 건일 때만 종목으로 확정합니다.
fn single_hit(mut hits: Vec<Instrument>) -> Resolution {
    match hits.len() {
        1 => hits.pop().map_or(Resolution::Ambiguous(0), Resolution::Found),
        n => Resolution::Ambiguous(n),
    }
}

fn detection_for<'a>(
    detections: &'a HashMap<String, ProbeResult>,
    entry: &RegistryEntry,
) -> Option<&'a ProbeResult> {
    entry
        .website
        .as_deref()
        .and_then(|website| detections.get(&normalize_domain(website)))
}

/// 카탈로그 조정기.
pub struct Reconciler {
    store: Arc<dyn DatasetStore>,
    registry: Arc<dyn FundRegistry>,
    instruments: Arc<dyn InstrumentService>,
    fetcher: Arc<dyn Fetcher>,
    config: AppConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn DatasetStore>,
        registry: Arc<dyn FundRegistry>,
        instruments: Arc<dyn InstrumentService>,
        fetcher: Arc<dyn Fetcher>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            registry,
            instruments,
            fetcher,
            config,
        }
    }

    /// 현재 저장된 카탈로그를 읽습니다.
    pub fn load(&self) -> EtfResult<Catalog> {
        Ok(Catalog::new(self.store.load()?))
    }

    /// 등록부와 시장 정보로 카탈로그를 갱신하고 저장합니다.
    ///
    /// `check_existing`이면 이미 알려진 도메인도 다시 탐색합니다.
    /// 종목 코드를 찾지 못한 신규 펀드는 에러가 아니라 결과로 반환됩니다.
    pub async fn update_dataset(&self, check_existing: bool) -> EtfResult<UpdateReport> {
        let start = Instant::now();
        let mut stats = UpdateStats::new();
        let catalog_config = &self.config.catalog;

        tracing::info!(check_existing, "카탈로그 갱신 시작");

        // 1. 로드
        let mut catalog = self.load()?;

        // 2. 등록부
        let funds = self.registry.funds().await?;
        let entries = select_registry(funds, catalog_config, &mut stats);
        stats.registry = entries.len();
        tracing::info!(rows = entries.len(), "등록부 필터 완료");

        // 3. 사이트 유형 탐색
        let domains = domains_to_probe(&catalog, &entries, check_existing);
        stats.probed = domains.len();
        let detections: HashMap<String, ProbeResult> =
            probe_domains(domains, self.fetcher.clone(), &self.config.probe)
                .await
                .into_iter()
                .filter_map(|(domain, result)| result.map(|found| (domain, found)))
                .collect();
        stats.detected = detections.len();

        // 4-5. 병합, 신규 식별
        let mut new_entries = Vec::new();
        for entry in entries {
            let detection = detection_for(&detections, &entry);
            match catalog.find_registration_mut(&entry.reg_no) {
                Some(row) => {
                    merge_entry(row, &entry, detection);
                    stats.merged += 1;
                }
                None => new_entries.push(entry),
            }
        }

        // 6. 종목 코드 확인
        let mut resolved = Vec::new();
        let mut unrecognized = Vec::new();
        for (entry, resolution) in self.resolve(new_entries).await {
            match resolution {
                Resolution::Found(instrument) => {
                    let mut row = FundRecord::new(instrument.l18, entry.name.clone(), entry.fund_type);
                    row.instrument_code = Some(instrument.instrument_code);
                    row.registration_number = Some(entry.reg_no.clone());
                    if let Some(found) = detection_for(&detections, &entry) {
                        row.url = Some(found.url.clone());
                        row.adapter_type = Some(found.site_type);
                    }
                    resolved.push(row);
                }
                Resolution::Ambiguous(matches) => {
                    tracing::warn!(reg_no = %entry.reg_no, name = %entry.name, matches, "종목 코드 확인 불가");
                    unrecognized.push(UnrecognizedFund {
                        entry,
                        matches: Some(matches),
                    });
                }
                Resolution::Failed => {
                    stats.failures += 1;
                    unrecognized.push(UnrecognizedFund {
                        entry,
                        matches: None,
                    });
                }
            }
        }

        // 7. 시장 종목 목록
        let feed: HashMap<String, Instrument> = match self.instruments.etf_instruments().await {
            Ok(instruments) => instruments
                .into_iter()
                .map(|instrument| (instrument.instrument_code.clone(), instrument))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "시장 종목 목록 조회 실패, 덮어쓰기 생략");
                stats.failures += 1;
                HashMap::new()
            }
        };
        let overwritten = catalog
            .rows_mut()
            .map(|row| apply_instrument(row, &feed))
            .filter(|applied| *applied)
            .count();
        for row in resolved.iter_mut() {
            apply_instrument(row, &feed);
        }
        tracing::debug!(rows = overwritten, "시장 종목 정보 반영");

        // 8. 추가
        for row in resolved {
            let existing = row
                .instrument_code
                .as_deref()
                .and_then(|code| catalog.find_instrument_mut(code));
            if let Some(existing) = existing {
                // 같은 종목이 이미 있으면 등록 번호만 채움
                if existing.registration_number.is_none() {
                    existing.registration_number = row.registration_number.clone();
                }
                if existing.site().is_none() && row.site().is_some() {
                    existing.url = row.url.clone();
                    existing.adapter_type = row.adapter_type;
                }
                stats.merged += 1;
            } else {
                tracing::info!(l18 = %row.l18, name = %row.name, "신규 펀드 추가");
                catalog.push(row);
                stats.appended += 1;
            }
        }
        stats.unrecognized = unrecognized.len();

        // 9. 저장
        catalog.sort();
        for violation in catalog.violations() {
            tracing::warn!(violation = %violation, "카탈로그 불변 조건 위반");
        }
        self.store.save(catalog.rows())?;

        stats.elapsed = start.elapsed();
        stats.log_summary("update_dataset");
        Ok(UpdateReport {
            unrecognized,
            stats,
        })
    }

    async fn resolve(&self, entries: Vec<RegistryEntry>) -> Vec<(RegistryEntry, Resolution)> {
        let concurrency = self.config.catalog.search_concurrency.max(1);
        let mut results: Vec<(RegistryEntry, Resolution)> = stream::iter(entries)
            .map(|entry| {
                let instruments = self.instruments.clone();
                async move {
                    let resolution = match instruments.search(&entry.name).await {
                        Ok(hits) => single_hit(hits),
                        Err(e) => {
                            tracing::warn!(reg_no = %entry.reg_no, error = %e, "종목 검색 실패");
                            Resolution::Failed
                        }
                    };
                    (entry, resolution)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by(|a, b| a.0.reg_no.cmp(&b.0.reg_no));
        results
    }

    /// 저장된 카탈로그를 검사합니다. `live`이면 사이트 유형을 다시 판별합니다.
    pub async fn check_dataset(&self, live: bool) -> EtfResult<CheckReport> {
        let catalog = self.load()?;
        Ok(check_catalog(
            &catalog,
            live,
            self.fetcher.clone(),
            self.config.probe.concurrency,
        )
        .await)
    }
}

/// 카탈로그 불변 조건을 검사하고, `live`이면 기록된 어댑터 유형의 드리프트를 찾습니다.
///
/// 위반과 드리프트는 로그와 결과로만 보고하며 실행을 중단하지 않습니다.
pub async fn check_catalog(
    catalog: &Catalog,
    live: bool,
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
) -> CheckReport {
    let start = Instant::now();
    let mut report = CheckReport {
        violations: catalog.violations(),
        ..CheckReport::default()
    };
    for violation in &report.violations {
        tracing::warn!(violation = %violation, "카탈로그 불변 조건 위반");
    }

    let mut targets = Vec::new();
    for row in catalog.rows() {
        match row.site() {
            Some((url, site_type)) => targets.push((row.l18.clone(), url.to_string(), site_type)),
            None => report.without_site.push(row.l18.clone()),
        }
    }

    if live {
        report.stats.checked = targets.len();
        let mut results: Vec<(String, String, SiteType, EtfResult<SiteType>)> =
            stream::iter(targets)
                .map(|(l18, url, recorded)| {
                    let fetcher = fetcher.clone();
                    async move {
                        let detected = from_url(&url, fetcher).await.map(|site| site.site_type());
                        (l18, url, recorded, detected)
                    }
                })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;
        results.sort_by(|a, b| a.0.cmp(&b.0));

        for (l18, url, recorded, detected) in results {
            match detected {
                Ok(site_type)
                    if site_type.detection_equivalent() == recorded.detection_equivalent() => {}
                Ok(site_type) => {
                    tracing::error!(l18 = %l18, url = %url, recorded = %recorded, detected = %site_type, "어댑터 유형 변경 감지");
                    report.drift.push(Drift {
                        l18,
                        url,
                        recorded,
                        detected: Some(site_type),
                    });
                }
                Err(EtfError::Classification(reason)) => {
                    tracing::error!(l18 = %l18, url = %url, recorded = %recorded, reason = %reason, "사이트 유형 판별 불가");
                    report.drift.push(Drift {
                        l18,
                        url,
                        recorded,
                        detected: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(l18 = %l18, url = %url, error = %e, "사이트 판별 실패");
                    report.failures.push((l18, e.to_string()));
                }
            }
        }
    }

    report.stats.rows = catalog.len();
    report.stats.violations = report.violations.len();
    report.stats.drift = report.drift.len();
    report.stats.failures = report.failures.len();
    report.stats.elapsed = start.elapsed();
    report.stats.log_summary("check_dataset");
    report
}
