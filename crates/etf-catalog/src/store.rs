//! 카탈로그 파일 저장소.
//!
//! CSV 형식: UTF-8 BOM, `\n` 줄바꿈, 고정 컬럼 순서, `l18` 정렬.

use etf_core::{CatalogConfig, EtfError, EtfResult, FundRecord};
use std::fs;
use std::path::{Path, PathBuf};

/// 저장 컬럼 순서
pub const COLUMNS: [&str; 7] = [
    "l18",
    "name",
    "type",
    "instrument_code",
    "registration_number",
    "url",
    "adapter_type",
];

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// 카탈로그 읽기/쓰기.
pub trait DatasetStore: Send + Sync {
    fn load(&self) -> EtfResult<Vec<FundRecord>>;

    /// `l18` 순으로 정렬해 저장합니다.
    fn save(&self, rows: &[FundRecord]) -> EtfResult<()>;
}

/// CSV 파일 저장소.
#[derive(Debug, Clone)]
pub struct CsvDatasetStore {
    path: PathBuf,
}

impl CsvDatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.dataset_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// CSV 바이트를 행으로 읽습니다. 앞의 BOM은 무시합니다.
pub fn parse_csv(bytes: &[u8]) -> EtfResult<Vec<FundRecord>> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.iter().map(str::trim).ne(COLUMNS) {
        return Err(EtfError::Dataset(format!(
            "unexpected columns: {:?}",
            headers.iter().collect::<Vec<_>>()
        )));
    }

    reader
        .deserialize()
        .map(|row| row.map_err(EtfError::from))
        .collect()
}

/// 행을 정렬된 CSV 바이트(BOM 포함)로 씁니다.
pub fn write_csv(rows: &[FundRecord]) -> EtfResult<Vec<u8>> {
    let mut sorted: Vec<&FundRecord> = rows.iter().collect();
    sorted.sort_by(|a, b| a.l18.cmp(&b.l18));

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(BOM.to_vec());
    if sorted.is_empty() {
        writer.write_record(COLUMNS)?;
    }
    for row in sorted {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtfError::Dataset(e.to_string()))
}

impl DatasetStore for CsvDatasetStore {
    fn load(&self) -> EtfResult<Vec<FundRecord>> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "카탈로그 파일 없음, 빈 카탈로그로 시작");
            return Ok(Vec::new());
        }
        let rows = parse_csv(&fs::read(&self.path)?)?;
        tracing::debug!(path = %self.path.display(), rows = rows.len(), "카탈로그 로드");
        Ok(rows)
    }

    fn save(&self, rows: &[FundRecord]) -> EtfResult<()> {
        let bytes = write_csv(rows)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // 임시 파일에 쓴 뒤 교체
        let tmp = self.path.with_extension("csv.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;

        tracing::info!(path = %self.path.display(), rows = rows.len(), "카탈로그 저장");
        Ok(())
    }
}
