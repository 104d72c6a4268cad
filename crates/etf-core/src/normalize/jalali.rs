//! 잘랄리(이란 태양력) ⇄ 그레고리력 변환.
//!
//! 33년 주기 윤년 규칙을 break 연도 표로 계산합니다 (유효 범위: 잘랄리 -61 ~ 3177년).

use crate::error::{EtfError, EtfResult};
use crate::normalize::persian_digits_to_ascii;
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// 날짜+시각 (`1402/05/01 10:15:00`)
pub const JALALI_DATETIME: &str = "%Y/%m/%d %H:%M:%S";
/// 날짜+시:분 (`1402/05/01 10:15`)
pub const JALALI_DATETIME_MINUTES: &str = "%Y/%m/%d %H:%M";
/// 날짜만 (`1402/05/01`, 뒤 공백 허용)
pub const JALALI_DATE: &str = "%Y/%m/%d ";

const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

/// 잘랄리 달력 날짜.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JalaliDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl JalaliDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// 그레고리력 날짜로 변환합니다.
    pub fn to_gregorian(&self) -> EtfResult<NaiveDate> {
        jalali_to_gregorian_date(self.year, self.month, self.day)
    }
}

impl From<NaiveDate> for JalaliDate {
    fn from(date: NaiveDate) -> Self {
        gregorian_to_jalali(date)
    }
}

impl fmt::Display for JalaliDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

struct YearInfo {
    /// 잘랄리 1월 1일이 속한 그레고리 연도
    gregorian_year: i32,
    /// 잘랄리 1월 1일의 그레고리 3월 일자
    march_day: u32,
    /// 마지막 윤년 이후 경과 연수 (0이면 윤년)
    leap: i32,
}

fn year_info(jy: i32) -> EtfResult<YearInfo> {
    if jy < BREAKS[0] || jy >= BREAKS[BREAKS.len() - 1] {
        return Err(EtfError::Parse(format!("Jalali year out of range: {}", jy)));
    }

    let gy = jy + 621;
    let mut leap_j = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;
    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if jy < jm {
            break;
        }
        leap_j += jump / 33 * 8 + (jump % 33) / 4;
        jp = jm;
    }

    let mut n = jy - jp;
    leap_j += n / 33 * 8 + ((n % 33) + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }
    let leap_g = gy / 4 - (gy / 100 + 1) * 3 / 4 - 150;
    let march_day = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + (jump + 4) / 33 * 33;
    }
    let mut leap = (((n + 1) % 33) - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    Ok(YearInfo {
        gregorian_year: gy,
        march_day: march_day as u32,
        leap,
    })
}

fn nowruz(info: &YearInfo) -> EtfResult<NaiveDate> {
    NaiveDate::from_ymd_opt(info.gregorian_year, 3, info.march_day)
        .ok_or_else(|| EtfError::Parse(format!("invalid Nowruz in {}", info.gregorian_year)))
}

/// 윤년 여부 (12월이 30일).
pub fn is_jalali_leap_year(jy: i32) -> bool {
    year_info(jy).map(|info| info.leap == 0).unwrap_or(false)
}

/// 잘랄리 월의 일 수. 1~6월 31일, 7~11월 30일, 12월 29/30일.
pub fn jalali_month_length(jy: i32, jm: u32) -> u32 {
    match jm {
        1..=6 => 31,
        7..=11 => 30,
        12 if is_jalali_leap_year(jy) => 30,
        12 => 29,
        _ => 0,
    }
}

/// 잘랄리 연/월/일을 그레고리력 날짜로 변환합니다.
pub fn jalali_to_gregorian_date(jy: i32, jm: u32, jd: u32) -> EtfResult<NaiveDate> {
    if !(1..=12).contains(&jm) || jd == 0 || jd > jalali_month_length(jy, jm) {
        return Err(EtfError::Parse(format!(
            "invalid Jalali date: {}/{}/{}",
            jy, jm, jd
        )));
    }

    let start = nowruz(&year_info(jy)?)?;
    // 1~6월 31일, 이후 30일
    let month_offset = if jm <= 6 {
        (jm - 1) * 31
    } else {
        186 + (jm - 7) * 30
    };
    let offset = month_offset + jd - 1;
    start
        .checked_add_days(Days::new(u64::from(offset)))
        .ok_or_else(|| EtfError::Parse(format!("date overflow: {}/{}/{}", jy, jm, jd)))
}

/// 그레고리력 날짜를 잘랄리 날짜로 변환합니다.
pub fn gregorian_to_jalali(date: NaiveDate) -> JalaliDate {
    let gy = date.year();
    let mut jy = gy - 621;
    // chrono가 표현하는 연도는 모두 유효 범위 안이다
    let Ok(info) = year_info(jy) else {
        return JalaliDate::new(jy, 1, 1);
    };
    let Ok(start) = nowruz(&info) else {
        return JalaliDate::new(jy, 1, 1);
    };

    let mut k = (date - start).num_days() as i32;
    if k >= 0 {
        if k <= 185 {
            return JalaliDate::new(jy, (1 + k / 31) as u32, (k % 31 + 1) as u32);
        }
        k -= 186;
    } else {
        jy -= 1;
        k += 179;
        if info.leap == 1 {
            k += 1;
        }
    }
    JalaliDate::new(jy, (7 + k / 30) as u32, (k % 30 + 1) as u32)
}

/// `%Y %m %d %H %M %S` 지시자를 지원하는 잘랄리 날짜 파서.
///
/// 형식 안의 공백은 입력의 공백 0개 이상과 일치하고, 입력이 남으면 실패합니다.
/// 페르시아 숫자는 ASCII로 바꾼 뒤 파싱합니다.
pub fn parse_jalali(s: &str, format: &str) -> EtfResult<NaiveDateTime> {
    let input = persian_digits_to_ascii(s);
    let mismatch = || EtfError::Parse(format!("{:?} does not match {:?}", s, format));

    let mut rest = input.as_str();
    let (mut year, mut month, mut day) = (None, None, None);
    let (mut hour, mut minute, mut second) = (0, 0, 0);

    let mut directives = format.chars();
    while let Some(c) = directives.next() {
        if c == '%' {
            let directive = directives.next().ok_or_else(mismatch)?;
            let max_len = if directive == 'Y' { 4 } else { 2 };
            let len = rest
                .bytes()
                .take(max_len)
                .take_while(u8::is_ascii_digit)
                .count();
            if len == 0 {
                return Err(mismatch());
            }
            let value: u32 = rest[..len].parse().map_err(|_| mismatch())?;
            rest = &rest[len..];
            match directive {
                'Y' => year = Some(value as i32),
                'm' => month = Some(value),
                'd' => day = Some(value),
                'H' => hour = value,
                'M' => minute = value,
                'S' => second = value,
                _ => return Err(mismatch()),
            }
        } else if c.is_whitespace() {
            rest = rest.trim_start();
        } else {
            rest = rest.strip_prefix(c).ok_or_else(mismatch)?;
        }
    }

    if !rest.is_empty() {
        return Err(mismatch());
    }

    let (year, month, day) = match (year, month, day) {
        (Some(y), Some(m), Some(d)) => (y, m, d),
        _ => return Err(mismatch()),
    };
    let date = jalali_to_gregorian_date(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(mismatch)?;
    Ok(date.and_time(time))
}

/// 잘랄리 날짜 문자열을 그레고리력 시각으로 변환합니다.
///
/// 형식을 순서대로 시도하며, 자세한 형식을 앞에 두고 느슨한 형식을 뒤에 둡니다.
pub fn jalali_to_gregorian(s: &str, formats: &[&str]) -> EtfResult<NaiveDateTime> {
    let mut last_error = EtfError::Parse(format!("no format given for {:?}", s));
    for format in formats {
        match parse_jalali(s, format) {
            Ok(datetime) => return Ok(datetime),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}
