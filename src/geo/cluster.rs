//! 单遍贪心空间聚类
//!
//! 按输入顺序遍历：每个未归簇的点开启一个新簇，随后的未归簇点若距当前簇质心不超过半径即被吸收，
//! 吸收后质心重新计算。没有合并/再平衡步骤，结果依赖输入顺序；需要最优划分的调用方
//! 应基于 [`centroid`] 与 [`haversine_km`] 自行叠加 k-means / DBSCAN。

use serde::{Deserialize, Serialize};

use super::distance::{centroid, haversine_km};
use super::Coordinates;

/// 簇成员：推荐名称与坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub name: String,
    pub coordinates: Coordinates,
}

impl ClusterMember {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }
}

/// 空间簇；所有成员到 center 的距离都不超过 radius_km，单成员簇半径为 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCluster {
    pub id: String,
    pub center: Coordinates,
    pub radius_km: f64,
    pub members: Vec<ClusterMember>,
}

impl GeoCluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// 贪心聚类；坐标非法的成员被忽略
pub fn cluster_greedy(items: &[ClusterMember], radius_km: f64) -> Vec<GeoCluster> {
    let items: Vec<&ClusterMember> = items.iter().filter(|m| m.coordinates.is_valid()).collect();
    let mut assigned = vec![false; items.len()];
    let mut clusters = Vec::new();

    for i in 0..items.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut members = vec![items[i].clone()];
        let mut center = items[i].coordinates;

        for j in (i + 1)..items.len() {
            if assigned[j] {
                continue;
            }
            if haversine_km(center, items[j].coordinates) <= radius_km {
                assigned[j] = true;
                members.push(items[j].clone());
                let points: Vec<Coordinates> = members.iter().map(|m| m.coordinates).collect();
                center = centroid(&points).unwrap_or(center);
            }
        }

        let radius = if members.len() == 1 {
            0.0
        } else {
            members
                .iter()
                .map(|m| haversine_km(center, m.coordinates))
                .fold(0.0, f64::max)
        };

        clusters.push(GeoCluster {
            id: format!("cluster-{}", clusters.len() + 1),
            center,
            radius_km: radius,
            members,
        });
    }

    clusters
}

/// 地理覆盖率（0-100）：簇成员中距参考点不超过 coverage_radius_km 的比例
///
/// 参考点为锚点（酒店）；没有锚点时取成员最多的簇中心。没有任何成员时为 0。
pub fn geographic_coverage(
    anchor: Option<Coordinates>,
    clusters: &[GeoCluster],
    coverage_radius_km: f64,
) -> f64 {
    let total: usize = clusters.iter().map(GeoCluster::len).sum();
    if total == 0 {
        return 0.0;
    }

    let reference = match anchor {
        Some(a) => a,
        None => match clusters.iter().max_by_key(|c| c.len()) {
            Some(c) => c.center,
            None => return 0.0,
        },
    };

    let covered = clusters
        .iter()
        .flat_map(|c| c.members.iter())
        .filter(|m| haversine_km(reference, m.coordinates) <= coverage_radius_km)
        .count();

    covered as f64 / total as f64 * 100.0
}
