//! Location Normalizer — maps free-text region names and regional groups to
//! concrete exam cities, and renders city sets back into display labels.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A concrete exam city. Declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CityId {
    #[serde(rename = "서울")]
    Seoul,
    #[serde(rename = "인천")]
    Incheon,
    #[serde(rename = "제주")]
    Jeju,
    #[serde(rename = "부산")]
    Busan,
    #[serde(rename = "울산")]
    Ulsan,
    #[serde(rename = "대구")]
    Daegu,
    #[serde(rename = "광주")]
    Gwangju,
    #[serde(rename = "전주")]
    Jeonju,
    #[serde(rename = "대전")]
    Daejeon,
    #[serde(rename = "서산")]
    Seosan,
    #[serde(rename = "원주")]
    Wonju,
    #[serde(rename = "강릉")]
    Gangneung,
    #[serde(rename = "춘천")]
    Chuncheon,
}

impl CityId {
    pub const ALL: [CityId; 13] = [
        CityId::Seoul,
        CityId::Incheon,
        CityId::Jeju,
        CityId::Busan,
        CityId::Ulsan,
        CityId::Daegu,
        CityId::Gwangju,
        CityId::Jeonju,
        CityId::Daejeon,
        CityId::Seosan,
        CityId::Wonju,
        CityId::Gangneung,
        CityId::Chuncheon,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CityId::Seoul => "서울",
            CityId::Incheon => "인천",
            CityId::Jeju => "제주",
            CityId::Busan => "부산",
            CityId::Ulsan => "울산",
            CityId::Daegu => "대구",
            CityId::Gwangju => "광주",
            CityId::Jeonju => "전주",
            CityId::Daejeon => "대전",
            CityId::Seosan => "서산",
            CityId::Wonju => "원주",
            CityId::Gangneung => "강릉",
            CityId::Chuncheon => "춘천",
        }
    }

    /// Matches a bare city name, tolerating administrative suffixes
    /// such as "서울특별시" or "부산광역시".
    pub fn from_name(raw: &str) -> Option<Self> {
        let name = strip_admin_suffix(raw.trim());
        CityId::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// The six regional groups used on official exam notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionGroup {
    Capital,
    Yeongnam,
    Daegu,
    Honam,
    Jungbu,
    Wonju,
}

impl RegionGroup {
    pub const ALL: [RegionGroup; 6] = [
        RegionGroup::Capital,
        RegionGroup::Yeongnam,
        RegionGroup::Daegu,
        RegionGroup::Honam,
        RegionGroup::Jungbu,
        RegionGroup::Wonju,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RegionGroup::Capital => "수도권",
            RegionGroup::Yeongnam => "영남",
            RegionGroup::Daegu => "대구",
            RegionGroup::Honam => "호남",
            RegionGroup::Jungbu => "중부",
            RegionGroup::Wonju => "원주",
        }
    }

    pub fn cities(&self) -> &'static [CityId] {
        match self {
            RegionGroup::Capital => &[CityId::Seoul, CityId::Incheon, CityId::Jeju],
            RegionGroup::Yeongnam => &[CityId::Busan, CityId::Ulsan],
            RegionGroup::Daegu => &[CityId::Daegu],
            RegionGroup::Honam => &[CityId::Gwangju, CityId::Jeonju],
            RegionGroup::Jungbu => &[CityId::Daejeon, CityId::Seosan],
            RegionGroup::Wonju => &[CityId::Wonju, CityId::Gangneung, CityId::Chuncheon],
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let label = raw.trim();
        RegionGroup::ALL.into_iter().find(|g| g.label() == label)
    }
}

fn strip_admin_suffix(name: &str) -> &str {
    for suffix in ["특별자치도", "특별자치시", "특별시", "광역시", "시"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped;
            }
        }
    }
    name
}

/// Returns the fixed city set for a regional group, or an empty set when
/// `name` is not one of the six known groups.
pub fn expand_group(name: &str) -> BTreeSet<CityId> {
    RegionGroup::from_label(name)
        .map(|g| g.cities().iter().copied().collect())
        .unwrap_or_default()
}

/// True when the token names a known group or city.
pub fn is_known_token(token: &str) -> bool {
    RegionGroup::from_label(token).is_some() || CityId::from_name(token).is_some()
}

/// Maps raw region tokens to concrete cities. Group names expand to their
/// members, known cities pass through, anything else (e.g. "사천") is dropped.
pub fn normalize<S: AsRef<str>>(raw_tokens: &[S]) -> BTreeSet<CityId> {
    let mut cities = BTreeSet::new();
    for token in raw_tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        if let Some(group) = RegionGroup::from_label(token) {
            cities.extend(group.cities().iter().copied());
        } else if let Some(city) = CityId::from_name(token) {
            cities.insert(city);
        } else {
            tracing::debug!("Dropping unrecognised region token '{token}'");
        }
    }
    cities
}

/// Splits a free-text location field ("수도권(서울, 인천), 영남 / 대구") into tokens.
pub fn tokenize(raw: &str) -> Vec<&str> {
    raw.split(|c: char| {
        c.is_whitespace() || matches!(c, ',' | ':' | '/' | '·' | '、' | '(' | ')' | '[' | ']' | '+' | '|')
    })
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .collect()
}

/// Convenience: tokenize then normalize.
pub fn normalize_text(raw: &str) -> BTreeSet<CityId> {
    normalize(&tokenize(raw))
}

/// Renders a city set for display. A group whose members are ALL present
/// collapses to `그룹명(city, city)`; partial groups stay a plain city list.
pub fn display(cities: &BTreeSet<CityId>) -> String {
    let mut remaining = cities.clone();
    let mut parts = Vec::new();

    for group in RegionGroup::ALL {
        let members = group.cities();
        if !members.iter().all(|c| remaining.contains(c)) {
            continue;
        }
        for city in members {
            remaining.remove(city);
        }
        // 대구 is a single-city group named after its only member.
        if members.len() == 1 && members[0].name() == group.label() {
            parts.push(group.label().to_string());
        } else {
            let names: Vec<&str> = members.iter().map(|c| c.name()).collect();
            parts.push(format!("{}({})", group.label(), names.join(", ")));
        }
    }

    parts.extend(remaining.iter().map(|c| c.name().to_string()));
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(cities: &[CityId]) -> BTreeSet<CityId> {
        cities.iter().copied().collect()
    }

    #[test]
    fn test_expand_capital_group() {
        assert_eq!(
            expand_group("수도권"),
            set(&[CityId::Seoul, CityId::Incheon, CityId::Jeju])
        );
    }

    #[test]
    fn test_expand_wonju_group_includes_gangwon_cities() {
        assert_eq!(
            expand_group("원주"),
            set(&[CityId::Wonju, CityId::Gangneung, CityId::Chuncheon])
        );
    }

    #[test]
    fn test_expand_unknown_group_is_empty() {
        assert!(expand_group("경기").is_empty());
    }

    #[test]
    fn test_normalize_drops_unknown_micro_region() {
        let cities = normalize(&["영남", "사천", "대전"]);
        assert_eq!(cities, set(&[CityId::Busan, CityId::Ulsan, CityId::Daejeon]));
    }

    #[test]
    fn test_normalize_accepts_administrative_suffix() {
        assert_eq!(normalize(&["서울특별시", "부산광역시"]), set(&[CityId::Seoul, CityId::Busan]));
    }

    #[test]
    fn test_normalize_text_with_display_label_roundtrips() {
        let cities = normalize_text("수도권(서울, 인천, 제주), 춘천");
        assert_eq!(
            cities,
            set(&[CityId::Seoul, CityId::Incheon, CityId::Jeju, CityId::Chuncheon])
        );
    }

    #[test]
    fn test_display_full_group_collapses() {
        let cities = set(&[CityId::Seoul, CityId::Incheon, CityId::Jeju]);
        assert_eq!(display(&cities), "수도권(서울, 인천, 제주)");
    }

    #[test]
    fn test_display_partial_group_stays_plain() {
        assert_eq!(display(&set(&[CityId::Seoul])), "서울");
        assert_eq!(display(&set(&[CityId::Seoul, CityId::Incheon])), "서울, 인천");
    }

    #[test]
    fn test_display_mixes_groups_and_leftovers() {
        let cities = set(&[
            CityId::Seoul,
            CityId::Incheon,
            CityId::Jeju,
            CityId::Busan,
            CityId::Daegu,
        ]);
        assert_eq!(display(&cities), "수도권(서울, 인천, 제주), 대구, 부산");
    }

    #[test]
    fn test_display_empty_set() {
        assert_eq!(display(&BTreeSet::new()), "");
    }
}
