//! 천 단위 구분 숫자 파싱.
//!
//! 사이트마다 `1,234,567`, `1 234 567`, `۱۲۳۴` 같은 표기를 섞어 씁니다.

use crate::error::{EtfError, EtfResult};
use serde_json::Value;

/// 페르시아/아랍 숫자를 ASCII 숫자로 바꿉니다. 아랍 소수점 `٫`은 `.`로 바꿉니다.
pub fn persian_digits_to_ascii(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            '٫' => '.',
            _ => c,
        })
        .collect()
}

/// 천 단위 구분자(쉼표, 아랍 쉼표, 공백)를 제거합니다.
fn strip_separators(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ',' | '٬') && !c.is_whitespace())
        .collect()
}

/// 천 단위 구분 문자열을 정수로 파싱합니다.
pub fn comma_int(s: &str) -> EtfResult<i64> {
    let cleaned = strip_separators(s);
    cleaned
        .parse::<i64>()
        .map_err(|_| EtfError::Parse(format!("not an integer: {:?}", s)))
}

/// 천 단위 구분 문자열을 실수로 파싱합니다.
pub fn comma_float(s: &str) -> EtfResult<f64> {
    let cleaned = strip_separators(s);
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(EtfError::Parse(format!("not a number: {:?}", s))),
    }
}

/// 정수를 천 단위 쉼표 표기로 만듭니다. `comma_int`의 역함수입니다.
pub fn comma_format(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// JSON 값(숫자 또는 천 단위 구분 문자열)을 정수로 읽습니다.
///
/// 소수부가 있는 숫자는 반올림합니다.
pub fn json_i64(value: &Value) -> EtfResult<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() => Ok(f.round() as i64),
                _ => Err(EtfError::Parse(format!("not an integer: {}", n))),
            }
        }
        Value::String(s) => comma_int(s).or_else(|_| comma_float(s).map(|f| f.round() as i64)),
        other => Err(EtfError::Parse(format!("not an integer: {}", other))),
    }
}

/// JSON 값(숫자 또는 천 단위 구분 문자열)을 실수로 읽습니다.
pub fn json_f64(value: &Value) -> EtfResult<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EtfError::Parse(format!("not a number: {}", n))),
        Value::String(s) => comma_float(&persian_digits_to_ascii(s)),
        other => Err(EtfError::Parse(format!("not a number: {}", other))),
    }
}
