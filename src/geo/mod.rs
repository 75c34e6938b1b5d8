//! 地理工具：距离、聚类、交通时间与每日可行性
//!
//! 全部是纯函数，无 I/O、无共享状态，可被不同阶段并发调用。

pub mod cluster;
pub mod distance;
pub mod gazetteer;
pub mod travel;

use serde::{Deserialize, Serialize};

pub use cluster::{cluster_greedy, geographic_coverage, ClusterMember, GeoCluster};
pub use distance::{centroid, haversine_km};
pub use gazetteer::lookup_city;
pub use travel::{
    daily_feasibility, detect_backtracking, estimate_segment, BacktrackFlag, DayFeasibility,
    DayStop, FeasibilityIssue, SegmentEstimate, TravelMode, TravelStyle,
};

/// 经纬度坐标（十进制度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude", alias = "lon")]
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// 纬度在 [-90, 90]、经度在 [-180, 180] 且均为有限值
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}
