//! NAVPS 스냅샷, 이력, 자산 배분 레코드.

use crate::normalize::comma_float;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// 실시간 NAVPS 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveNavps {
    /// 발행(매입) 가격
    pub creation: i64,
    /// 환매(취소) 가격
    pub redemption: i64,
    /// 스냅샷 시각 (그레고리력)
    pub date: NaiveDateTime,
    /// 어댑터별 추가 필드 (액면가, 순자산, 단위 수 등)
    pub extra: BTreeMap<String, Value>,
}

impl LiveNavps {
    pub fn new(creation: i64, redemption: i64, date: NaiveDateTime) -> Self {
        Self {
            creation,
            redemption,
            date,
            extra: BTreeMap::new(),
        }
    }

    /// 추가 필드를 실수로 읽습니다. 숫자와 천 단위 구분 문자열 모두 허용합니다.
    pub fn extra_f64(&self, key: &str) -> Option<f64> {
        match self.extra.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => comma_float(s).ok(),
            _ => None,
        }
    }

    /// 환매가가 발행가 이하인지 확인합니다.
    pub fn is_spread_consistent(&self) -> bool {
        self.redemption <= self.creation
    }
}

/// 보통/우선 단위로 나뉜 레버리지 펀드의 단위 클래스 가격.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitClassNavps {
    pub creation: f64,
    pub redemption: f64,
    pub statistical: Option<f64>,
}

/// NAVPS 이력의 한 행 (거래일 하나).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavpsRecord {
    pub date: NaiveDate,
    pub creation: f64,
    pub redemption: f64,
    /// 통계적 NAV (공정가치 추정)
    pub statistical: Option<f64>,
    /// 레버리지 펀드의 보통 단위 가격 (creation/redemption은 우선 단위)
    pub common: Option<UnitClassNavps>,
}

impl NavpsRecord {
    pub fn new(date: NaiveDate, creation: f64, redemption: f64, statistical: Option<f64>) -> Self {
        Self {
            date,
            creation,
            redemption,
            statistical,
            common: None,
        }
    }
}

/// 날짜 오름차순, 날짜 중복 없는 NAVPS 이력.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NavpsHistory {
    records: Vec<NavpsRecord>,
}

impl NavpsHistory {
    /// 레코드를 날짜순으로 정렬하고 같은 날짜는 마지막 값만 남깁니다.
    pub fn from_records(records: Vec<NavpsRecord>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, NavpsRecord> = BTreeMap::new();
        for record in records {
            by_date.insert(record.date, record);
        }
        Self {
            records: by_date.into_values().collect(),
        }
    }

    pub fn records(&self) -> &[NavpsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&NavpsRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&NavpsRecord> {
        self.records.last()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&NavpsRecord> {
        self.records
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &NavpsRecord> {
        self.records.iter()
    }
}

/// 자산 배분: 플랫폼별 페르시아어 분류 라벨 → [0, 1] 비율.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetAllocation(BTreeMap<String, f64>);

impl AssetAllocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, fraction: f64) {
        self.0.insert(label.into(), fraction);
    }

    /// 라벨의 비율. 없으면 0.
    pub fn get(&self, label: &str) -> f64 {
        self.0.get(label).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// 주어진 라벨 비율의 합.
    pub fn sum_of(&self, labels: &[&str]) -> f64 {
        labels.iter().map(|label| self.get(label)).sum()
    }

    /// 허용 목록에 없는 라벨.
    pub fn unknown_labels<'a>(&'a self, allowed: &[&str]) -> Vec<&'a str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|label| !allowed.contains(label))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for AssetAllocation {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 배당(이익 분배) 이력의 한 행.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendRecord {
    /// 분배 기준일
    pub date: NaiveDate,
    /// 분배 대상 단위 수
    pub fund_units: i64,
    /// 단위당 분배액
    pub unit_profit: f64,
    /// 총 분배액
    pub total_profit: f64,
    /// 분배율 (%)
    pub profit_percent: Option<f64>,
}

/// 펀드 전체 순자산 이력의 한 행.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavRecord {
    pub date: NaiveDate,
    /// 순자산 총액
    pub nav: f64,
    /// 환매가
    pub redemption: f64,
}
