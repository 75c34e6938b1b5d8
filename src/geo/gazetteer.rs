//! 有界城市坐标表（非权威地理编码）
//!
//! 只用于给缺少坐标的目的地提供默认中心点；查不到返回 None。

use super::Coordinates;

const CITIES: &[(&str, f64, f64)] = &[
    ("amsterdam", 52.3676, 4.9041),
    ("athens", 37.9838, 23.7275),
    ("bangkok", 13.7563, 100.5018),
    ("barcelona", 41.3874, 2.1686),
    ("beijing", 39.9042, 116.4074),
    ("berlin", 52.5200, 13.4050),
    ("buenos aires", -34.6037, -58.3816),
    ("cairo", 30.0444, 31.2357),
    ("cape town", -33.9249, 18.4241),
    ("chicago", 41.8781, -87.6298),
    ("copenhagen", 55.6761, 12.5683),
    ("dubai", 25.2048, 55.2708),
    ("dublin", 53.3498, -6.2603),
    ("hong kong", 22.3193, 114.1694),
    ("istanbul", 41.0082, 28.9784),
    ("kyoto", 35.0116, 135.7681),
    ("lisbon", 38.7223, -9.1393),
    ("london", 51.5074, -0.1278),
    ("los angeles", 34.0522, -118.2437),
    ("madrid", 40.4168, -3.7038),
    ("mexico city", 19.4326, -99.1332),
    ("milan", 45.4642, 9.1900),
    ("montreal", 45.5017, -73.5673),
    ("munich", 48.1351, 11.5820),
    ("new york", 40.7128, -74.0060),
    ("paris", 48.8566, 2.3522),
    ("prague", 50.0755, 14.4378),
    ("reykjavik", 64.1466, -21.9426),
    ("rio de janeiro", -22.9068, -43.1729),
    ("rome", 41.9028, 12.4964),
    ("san francisco", 37.7749, -122.4194),
    ("seoul", 37.5665, 126.9780),
    ("shanghai", 31.2304, 121.4737),
    ("singapore", 1.3521, 103.8198),
    ("sydney", -33.8688, 151.2093),
    ("tokyo", 35.6762, 139.6503),
    ("toronto", 43.6532, -79.3832),
    ("vancouver", 49.2827, -123.1207),
    ("vienna", 48.2082, 16.3738),
    ("zurich", 47.3769, 8.5417),
];

/// 按城市名查坐标；忽略大小写、常见变音符号与逗号后的国家/地区部分
pub fn lookup_city(name: &str) -> Option<Coordinates> {
    let key = normalize_key(name);
    if key.is_empty() {
        return None;
    }
    CITIES
        .iter()
        .find(|(city, _, _)| *city == key)
        .map(|(_, lat, lng)| Coordinates::new(*lat, *lng))
}

fn normalize_key(name: &str) -> String {
    let head = name.split(',').next().unwrap_or_default();
    let folded: String = head
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            '-' | '_' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_variants() {
        let paris = Coordinates::new(48.8566, 2.3522);
        assert_eq!(lookup_city("Paris"), Some(paris));
        assert_eq!(lookup_city("  paris, France "), Some(paris));
        assert_eq!(lookup_city("Zürich"), lookup_city("zurich"));
        assert_eq!(lookup_city("Reykjavík"), lookup_city("reykjavik"));
        assert!(lookup_city("New-York").is_some());
    }

    #[test]
    fn test_unknown_city() {
        assert_eq!(lookup_city("Atlantis"), None);
        assert_eq!(lookup_city(""), None);
    }
}
