//! # ETF Core
//!
//! 펀드 NAV 수집기의 핵심 도메인 타입과 공통 인프라를 제공합니다.
//!
//! - 카탈로그 행, 펀드 유형, 사이트 어댑터 유형
//! - 실시간 NAVPS, NAVPS 이력, 자산 배분 레코드
//! - 천 단위 구분 숫자 및 잘랄리(Jalali) 날짜 정규화
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use normalize::*;
pub use types::*;
