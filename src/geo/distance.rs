//! 大圆距离与质心

use super::Coordinates;

/// 地球平均半径（公里）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine 大圆距离（公里）
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // 浮点误差可能让 h 略大于 1
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// 成员坐标的算术平均；空输入返回 None
pub fn centroid(points: &[Coordinates]) -> Option<Coordinates> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    Some(Coordinates::new(lat / n, lng / n))
}
