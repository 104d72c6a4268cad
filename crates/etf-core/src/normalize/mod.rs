//! 운용사 사이트 응답의 숫자/날짜 정규화.

mod jalali;
mod numeral;

pub use jalali::*;
pub use numeral::*;
