//! # ETF Catalog
//!
//! 거래 가능한 ETF 카탈로그의 저장, 등록부 조정, 일관성 검사를 제공합니다.
//!
//! - `store`: BOM이 붙은 CSV 카탈로그 파일
//! - `catalog`: 메모리 카탈로그와 고유성 검사
//! - `sources`: 등록부/시장 종목 서비스 트레이트
//! - `reconcile`: 갱신(`update_dataset`)과 드리프트 검사(`check_dataset`)

pub mod catalog;
pub mod reconcile;
pub mod sources;
pub mod stats;
pub mod store;

pub use catalog::{site_for_l18, Catalog, Violation};
pub use reconcile::{
    check_catalog, domains_to_probe, merge_entry, select_registry, CheckReport, Drift, Reconciler,
    RegistryEntry, UnrecognizedFund, UpdateReport,
};
pub use sources::{FundRegistry, Instrument, InstrumentService, RegistryFund};
pub use stats::{CheckStats, UpdateStats};
pub use store::{parse_csv, write_csv, CsvDatasetStore, DatasetStore, COLUMNS};
