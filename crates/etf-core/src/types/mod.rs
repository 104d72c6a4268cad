//! 카탈로그와 어댑터가 공유하는 타입.

mod fund;
mod navps;
mod site_type;

pub use fund::*;
pub use navps::*;
pub use site_type::*;
