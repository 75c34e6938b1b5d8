//! 执行上下文：在阶段之间传递的单写者状态
//!
//! 上下文不可原地修改：每次折叠（fold）一个 Agent 的结果都会返回新版本（version + 1），
//! Agent 拿到的永远是某个版本的只读快照，因此无需加锁，测试中也可以逐版本重放。

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::geo::{cluster_greedy, ClusterMember, Coordinates, GeoCluster};
use crate::normalize::CanonicalRecommendation;
use crate::synth::budget::{category_estimate, BudgetLedger};

use super::criteria::{Category, EnhancedCriteria, TripCriteria};

/// 地理锚点（通常为选定酒店）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorLocation {
    pub name: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub version: u64,
    pub anchor_location: Option<AnchorLocation>,
    pub clusters: Vec<GeoCluster>,
    /// 活动推荐的坐标（供餐厅 Agent 就近搜索）
    pub activity_locations: Vec<Coordinates>,
    pub budget_ledger: BudgetLedger,
}

impl ExecutionContext {
    pub fn new(criteria: &TripCriteria, cfg: &AppConfig) -> Self {
        Self {
            version: 0,
            anchor_location: None,
            clusters: Vec::new(),
            activity_locations: Vec::new(),
            budget_ledger: BudgetLedger::from_criteria(criteria, &cfg.budget),
        }
    }

    /// 折叠一个完成的 Agent 的结果，返回新版本的上下文
    pub fn fold(
        &self,
        category: Category,
        records: &[CanonicalRecommendation],
        criteria: &TripCriteria,
        cfg: &AppConfig,
    ) -> Self {
        let mut next = self.clone();
        next.version += 1;

        let estimate = category_estimate(category, records, criteria, &cfg.budget);
        next.budget_ledger.record(category, estimate);
        if let Some(hint) = next.budget_ledger.hint_for(category) {
            if hint > 0.0 && estimate > hint * (1.0 + cfg.budget.warn_ratio) {
                tracing::warn!(
                    category = %category,
                    estimate,
                    hint,
                    "Category estimate exceeds budget hint"
                );
            }
        }

        match category {
            Category::Accommodation => {
                next.anchor_location = records.iter().find_map(|r| {
                    r.coordinates().map(|coordinates| AnchorLocation {
                        name: r.name.clone(),
                        coordinates,
                        address: r.location.address.clone(),
                    })
                });
                if next.anchor_location.is_none() && !records.is_empty() {
                    tracing::warn!("No accommodation carries coordinates; anchor location unset");
                }
            }
            Category::Activity => {
                let members: Vec<ClusterMember> = records
                    .iter()
                    .filter_map(|r| r.coordinates().map(|c| ClusterMember::new(r.name.clone(), c)))
                    .collect();
                next.activity_locations = members.iter().map(|m| m.coordinates).collect();
                next.clusters = cluster_greedy(&members, cfg.geo.cluster_radius_km);
            }
            Category::Flight | Category::Restaurant => {}
        }

        next
    }

    /// 按角色把上下文字段合并进基础条件
    pub fn enhance(&self, base: &TripCriteria, role: Category, cfg: &AppConfig) -> EnhancedCriteria {
        let mut enhanced = EnhancedCriteria {
            base: base.clone(),
            role,
            context_version: self.version,
            anchor_location: None,
            max_distance_from_hotel_km: None,
            preferred_areas: Vec::new(),
            activity_locations: Vec::new(),
            budget_hint: self.budget_ledger.hint_for(role),
        };

        let mut preferred_areas = base.preferences.preferred_areas.clone();

        match role {
            Category::Flight => {}
            Category::Accommodation => {
                enhanced.preferred_areas = preferred_areas;
            }
            Category::Activity | Category::Restaurant => {
                if let Some(anchor) = &self.anchor_location {
                    enhanced.anchor_location = Some(anchor.clone());
                    enhanced.max_distance_from_hotel_km = Some(cfg.geo.max_distance_from_hotel_km);
                    if let Some(address) = &anchor.address {
                        if !preferred_areas.contains(address) {
                            preferred_areas.push(address.clone());
                        }
                    }
                }
                enhanced.preferred_areas = preferred_areas;
                if role == Category::Restaurant {
                    let mut locations = self.activity_locations.clone();
                    locations.extend(self.clusters.iter().map(|c| c.center));
                    enhanced.activity_locations = locations;
                }
            }
        }

        enhanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{CategoryMetadata, Confidence, Location, Price, Rating};

    fn criteria() -> TripCriteria {
        serde_json::from_value(serde_json::json!({
            "destination": "Paris",
            "start_date": "2026-05-01",
            "end_date": "2026-05-03",
            "preferences": { "preferred_areas": ["Le Marais"] },
        }))
        .unwrap()
    }

    fn located(name: &str, lat: f64, lng: f64, amount: f64) -> CanonicalRecommendation {
        CanonicalRecommendation {
            name: name.into(),
            description: String::new(),
            price: Price {
                amount,
                currency: "USD".into(),
                unit: "per_night".into(),
            },
            rating: Rating {
                score: 4.5,
                review_count: 10,
                source: "test".into(),
            },
            location: Location {
                address: Some(format!("{name} street")),
                city: Some("Paris".into()),
                coordinates: Some(Coordinates::new(lat, lng)),
            },
            confidence: Confidence {
                score: 0.8,
                reasoning: "test".into(),
            },
            category_metadata: CategoryMetadata::Accommodation {
                property_type: None,
                amenities: vec![],
            },
            external_ids: Default::default(),
            images: vec![],
        }
    }

    #[test]
    fn test_fold_is_copy_on_write() {
        let cfg = AppConfig::default();
        let c = criteria();
        let v0 = ExecutionContext::new(&c, &cfg);
        let v1 = v0.fold(
            Category::Accommodation,
            &[located("Hotel Lutetia", 48.8566, 2.3522, 200.0)],
            &c,
            &cfg,
        );
        assert_eq!(v0.version, 0);
        assert!(v0.anchor_location.is_none());
        assert_eq!(v1.version, 1);
        assert_eq!(v1.anchor_location.as_ref().unwrap().name, "Hotel Lutetia");
        assert_eq!(v1.budget_ledger.total_estimate, 400.0);
    }

    #[test]
    fn test_activity_fold_builds_clusters() {
        let cfg = AppConfig::default();
        let c = criteria();
        let ctx = ExecutionContext::new(&c, &cfg).fold(
            Category::Activity,
            &[
                located("Louvre", 48.8606, 2.3376, 20.0),
                located("Notre-Dame", 48.8530, 2.3499, 0.0),
                located("Vincennes", 48.8566, 2.4612, 0.0),
            ],
            &c,
            &cfg,
        );
        assert_eq!(ctx.clusters.len(), 2);
        assert_eq!(ctx.activity_locations.len(), 3);
    }

    #[test]
    fn test_enhance_injects_anchor_for_location_roles() {
        let cfg = AppConfig::default();
        let c = criteria();
        let ctx = ExecutionContext::new(&c, &cfg).fold(
            Category::Accommodation,
            &[located("Hotel", 48.8566, 2.3522, 100.0)],
            &c,
            &cfg,
        );

        let flight = ctx.enhance(&c, Category::Flight, &cfg);
        assert!(flight.anchor_location.is_none());

        let activity = ctx.enhance(&c, Category::Activity, &cfg);
        assert_eq!(activity.context_version, 1);
        assert_eq!(activity.max_distance_from_hotel_km, Some(5.0));
        assert!(activity.preferred_areas.contains(&"Le Marais".to_string()));
        assert!(activity.preferred_areas.contains(&"Hotel street".to_string()));
    }

    #[test]
    fn test_enhance_without_anchor_is_degraded() {
        let cfg = AppConfig::default();
        let c = criteria();
        let ctx = ExecutionContext::new(&c, &cfg);
        let restaurant = ctx.enhance(&c, Category::Restaurant, &cfg);
        assert!(restaurant.anchor_location.is_none());
        assert!(restaurant.max_distance_from_hotel_km.is_none());
        assert!(restaurant.activity_locations.is_empty());
    }
}
