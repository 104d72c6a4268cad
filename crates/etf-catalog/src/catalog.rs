//! 메모리 상의 펀드 카탈로그.

use etf_core::{EtfError, EtfResult, FundRecord};
use etf_sites::{Fetcher, Site};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 카탈로그 불변 조건 위반.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// 고유해야 하는 컬럼의 중복 값
    Duplicate {
        column: &'static str,
        value: String,
        l18s: Vec<String>,
    },
    /// URL 없이 어댑터 유형만 있는 행
    AdapterWithoutUrl { l18: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Duplicate { column, value, l18s } => {
                write!(f, "duplicate {} {:?} in rows {:?}", column, value, l18s)
            }
            Violation::AdapterWithoutUrl { l18 } => {
                write!(f, "{} has adapter_type but no url", l18)
            }
        }
    }
}

/// 펀드 카탈로그. 한 번의 조정 동안 단일 소유자가 수정합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    rows: Vec<FundRecord>,
}

impl Catalog {
    pub fn new(mut rows: Vec<FundRecord>) -> Self {
        rows.sort_by(|a, b| a.l18.cmp(&b.l18));
        Self { rows }
    }

    pub fn rows(&self) -> &[FundRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FundRecord> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find_l18(&self, l18: &str) -> Option<&FundRecord> {
        self.rows.iter().find(|row| row.l18 == l18)
    }

    pub fn find_registration(&self, reg_no: &str) -> Option<&FundRecord> {
        self.rows
            .iter()
            .find(|row| row.registration_number.as_deref() == Some(reg_no))
    }

    pub fn find_registration_mut(&mut self, reg_no: &str) -> Option<&mut FundRecord> {
        self.rows
            .iter_mut()
            .find(|row| row.registration_number.as_deref() == Some(reg_no))
    }

    pub fn find_instrument_mut(&mut self, code: &str) -> Option<&mut FundRecord> {
        self.rows
            .iter_mut()
            .find(|row| row.instrument_code.as_deref() == Some(code))
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut FundRecord> {
        self.rows.iter_mut()
    }

    /// 행을 추가하고 `l18` 순서를 유지합니다.
    pub fn push(&mut self, row: FundRecord) {
        let index = self.rows.partition_point(|existing| existing.l18 <= row.l18);
        self.rows.insert(index, row);
    }

    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| a.l18.cmp(&b.l18));
    }

    /// 고유성과 URL/어댑터 일관성을 검사합니다.
    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        let columns: [(&'static str, fn(&FundRecord) -> Option<&str>); 4] = [
            ("l18", |row| Some(row.l18.as_str())),
            ("name", |row| Some(row.name.as_str())),
            ("instrument_code", |row| row.instrument_code.as_deref()),
            ("registration_number", |row| row.registration_number.as_deref()),
        ];

        for (column, value_of) in columns {
            let mut seen: HashMap<&str, Vec<String>> = HashMap::new();
            for row in &self.rows {
                if let Some(value) = value_of(row) {
                    seen.entry(value).or_default().push(row.l18.clone());
                }
            }
            let mut duplicates: Vec<Violation> = seen
                .into_iter()
                .filter(|(_, l18s)| l18s.len() > 1)
                .map(|(value, l18s)| Violation::Duplicate {
                    column,
                    value: value.to_string(),
                    l18s,
                })
                .collect();
            duplicates.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
            violations.extend(duplicates);
        }

        violations.extend(
            self.rows
                .iter()
                .filter(|row| row.adapter_type.is_some() && row.url.is_none())
                .map(|row| Violation::AdapterWithoutUrl {
                    l18: row.l18.clone(),
                }),
        );

        violations
    }
}

/// `l18`로 카탈로그 행을 찾아 어댑터를 만듭니다.
pub fn site_for_l18(catalog: &Catalog, l18: &str, fetcher: Arc<dyn Fetcher>) -> EtfResult<Site> {
    let row = catalog
        .find_l18(l18)
        .ok_or_else(|| EtfError::Dataset(format!("unknown l18: {}", l18)))?;
    let (url, site_type) = row
        .site()
        .ok_or_else(|| EtfError::Dataset(format!("{} has no site", l18)))?;
    Site::new(site_type, url, fetcher)
}
