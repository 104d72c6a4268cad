//! 사이트 어댑터 유형 (카탈로그의 `adapter_type` 컬럼).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 운용사 플랫폼별 어댑터 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SiteType {
    /// 마브나 DP 플랫폼
    #[serde(rename = "MabnaDP")]
    MabnaDp,
    /// 라얀 하맙자 플랫폼 (경로에 펀드 ID)
    RayanHamafza,
    /// 라얀 하맙자 다중 펀드 (쿠키로 펀드 선택)
    RayanHamafzaMultiNav,
    /// 타드비르 파르다즈 플랫폼
    TadbirPardaz,
    /// 타드비르 파르다즈 다중 바스켓 (쿼리로 바스켓 선택)
    TadbirPardazMultiNav,
    /// 타드비르 파르다즈 레버리지 펀드
    LeveragedTadbirPardaz,
    /// 마브나 DP 레버리지 펀드 (v2 API)
    #[serde(rename = "LeveragedMabnaDP")]
    LeveragedMabnaDp,
}

impl SiteType {
    pub const ALL: [SiteType; 7] = [
        SiteType::MabnaDp,
        SiteType::RayanHamafza,
        SiteType::RayanHamafzaMultiNav,
        SiteType::TadbirPardaz,
        SiteType::TadbirPardazMultiNav,
        SiteType::LeveragedTadbirPardaz,
        SiteType::LeveragedMabnaDp,
    ];

    /// 카탈로그에 저장되는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteType::MabnaDp => "MabnaDP",
            SiteType::RayanHamafza => "RayanHamafza",
            SiteType::RayanHamafzaMultiNav => "RayanHamafzaMultiNav",
            SiteType::TadbirPardaz => "TadbirPardaz",
            SiteType::TadbirPardazMultiNav => "TadbirPardazMultiNav",
            SiteType::LeveragedTadbirPardaz => "LeveragedTadbirPardaz",
            SiteType::LeveragedMabnaDp => "LeveragedMabnaDP",
        }
    }

    /// 한 사이트에 여러 펀드/바스켓이 있는 변형인지 확인합니다.
    ///
    /// 이런 행은 수동으로 분류되므로 등록부 조정에서 덮어쓰지 않습니다.
    pub fn is_multi_fund(&self) -> bool {
        matches!(
            self,
            SiteType::RayanHamafzaMultiNav | SiteType::TadbirPardazMultiNav
        )
    }

    /// 레버리지 변형인지 확인합니다.
    pub fn is_leveraged(&self) -> bool {
        matches!(
            self,
            SiteType::LeveragedTadbirPardaz | SiteType::LeveragedMabnaDp
        )
    }

    /// 홈페이지만으로 구분할 수 있는 유형으로 변환합니다.
    ///
    /// 라얀 하맙자 다중 펀드는 홈페이지가 일반 사이트와 같습니다.
    pub fn detection_equivalent(&self) -> SiteType {
        match self {
            SiteType::RayanHamafzaMultiNav => SiteType::RayanHamafza,
            other => *other,
        }
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SiteType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown site type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_type_names_round_trip() {
        for site_type in SiteType::ALL {
            assert_eq!(site_type.as_str().parse::<SiteType>().unwrap(), site_type);
            let json = serde_json::to_string(&site_type).unwrap();
            assert_eq!(json, format!("\"{}\"", site_type.as_str()));
        }
        assert!("Mabna".parse::<SiteType>().is_err());
    }

    #[test]
    fn test_variant_flags() {
        assert!(SiteType::TadbirPardazMultiNav.is_multi_fund());
        assert!(SiteType::RayanHamafzaMultiNav.is_multi_fund());
        assert!(!SiteType::LeveragedTadbirPardaz.is_multi_fund());
        assert!(SiteType::LeveragedMabnaDp.is_leveraged());
        assert!(!SiteType::MabnaDp.is_leveraged());
        assert_eq!(
            SiteType::RayanHamafzaMultiNav.detection_equivalent(),
            SiteType::RayanHamafza
        );
        assert_eq!(
            SiteType::TadbirPardazMultiNav.detection_equivalent(),
            SiteType::TadbirPardazMultiNav
        );
    }
}
