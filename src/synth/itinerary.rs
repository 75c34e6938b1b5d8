//! 逐日行程
//!
//! 第一天以航班抵达和入住开始；活动簇按顺序分配到各天（每天不超过上限，簇内溢出顺延到下一天）；
//! 每天搭配离当天簇中心最近的餐厅；最后一天以返程结束。

use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::core::{Category, ExecutionContext, TripCriteria};
use crate::geo::{daily_feasibility, haversine_km, ClusterMember, Coordinates, DayFeasibility, DayStop};
use crate::normalize::{CanonicalRecommendation, CategoryMetadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryStop {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub dwell_minutes: f64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    pub day: u32,
    pub date: NaiveDate,
    #[serde(default)]
    pub cluster_id: Option<String>,
    pub stops: Vec<ItineraryStop>,
    /// 当天至少有一个带坐标的停留点时才计算
    #[serde(default)]
    pub feasibility: Option<DayFeasibility>,
}

/// 逐日行程，以及因天数不足没能排进行程的活动簇
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Itinerary {
    pub days: Vec<ItineraryDay>,
    pub unscheduled_clusters: Vec<String>,
}

pub fn build_itinerary(
    criteria: &TripCriteria,
    recommendations: &BTreeMap<Category, Vec<CanonicalRecommendation>>,
    context: &ExecutionContext,
    cfg: &AppConfig,
) -> Itinerary {
    let dates = criteria.days();
    let last = dates.len().saturating_sub(1);
    let flight = recommendations.get(&Category::Flight).and_then(|r| r.first());
    let activities = recommendations
        .get(&Category::Activity)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let restaurants = recommendations
        .get(&Category::Restaurant)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut queue: VecDeque<(String, Vec<ClusterMember>)> = context
        .clusters
        .iter()
        .map(|c| (c.id.clone(), c.members.clone()))
        .collect();
    let per_day = cfg.geo.max_activities_per_day.max(1);
    let mut used_restaurants: Vec<usize> = Vec::new();
    let mut days = Vec::with_capacity(dates.len());

    for (index, date) in dates.iter().enumerate() {
        let mut stops = Vec::new();

        if index == 0 {
            if let Some(flight) = flight {
                stops.push(ItineraryStop {
                    name: flight.name.clone(),
                    category: Category::Flight,
                    coordinates: None,
                    dwell_minutes: cfg.geo.dwell_minutes.flight,
                    note: Some(format!("arrival{}", flight_time(flight, false))),
                });
            }
            if let Some(anchor) = &context.anchor_location {
                stops.push(ItineraryStop {
                    name: anchor.name.clone(),
                    category: Category::Accommodation,
                    coordinates: Some(anchor.coordinates),
                    dwell_minutes: cfg.geo.dwell_minutes.accommodation,
                    note: Some("check-in".to_string()),
                });
            }
        }

        let mut cluster_id = None;
        let mut day_center = context.anchor_location.as_ref().map(|a| a.coordinates);
        if let Some((id, mut members)) = queue.pop_front() {
            let rest = if members.len() > per_day {
                members.split_off(per_day)
            } else {
                Vec::new()
            };
            if let Some(center) = crate::geo::centroid(
                &members.iter().map(|m| m.coordinates).collect::<Vec<_>>(),
            ) {
                day_center = Some(center);
            }
            for member in &members {
                stops.push(ItineraryStop {
                    name: member.name.clone(),
                    category: Category::Activity,
                    coordinates: Some(member.coordinates),
                    dwell_minutes: activity_dwell(&member.name, activities, cfg),
                    note: None,
                });
            }
            if !rest.is_empty() {
                queue.push_front((id.clone(), rest));
            }
            cluster_id = Some(id);
        }

        if let Some(i) = pick_restaurant(restaurants, day_center, &used_restaurants, index) {
            used_restaurants.push(i);
            let r = &restaurants[i];
            stops.push(ItineraryStop {
                name: r.name.clone(),
                category: Category::Restaurant,
                coordinates: r.coordinates(),
                dwell_minutes: cfg.geo.dwell_minutes.restaurant,
                note: None,
            });
        }

        if index == last {
            if let Some(flight) = flight {
                stops.push(ItineraryStop {
                    name: flight.name.clone(),
                    category: Category::Flight,
                    coordinates: None,
                    dwell_minutes: cfg.geo.dwell_minutes.flight,
                    note: Some(format!("departure{}", flight_time(flight, true))),
                });
            }
        }

        let feasibility = day_route(&stops, context, index).map(|route| {
            daily_feasibility(
                &route,
                criteria.preferences.travel_mode,
                criteria.preferences.travel_style,
                &cfg.geo,
            )
        });

        days.push(ItineraryDay {
            day: index as u32 + 1,
            date: *date,
            cluster_id,
            stops,
            feasibility,
        });
    }

    let mut unscheduled_clusters: Vec<String> = Vec::new();
    let mut unscheduled_activities = 0;
    for (id, members) in queue {
        unscheduled_activities += members.len();
        if !unscheduled_clusters.contains(&id) {
            unscheduled_clusters.push(id);
        }
    }
    if !unscheduled_clusters.is_empty() {
        tracing::warn!(
            days = days.len(),
            clusters = ?unscheduled_clusters,
            activities = unscheduled_activities,
            "More activity clusters than trip days; leftovers not scheduled"
        );
    }

    Itinerary {
        days,
        unscheduled_clusters,
    }
}

/// 当天的路线：从锚点出发（第一天锚点已在停留点中），依次经过带坐标的停留点
fn day_route(stops: &[ItineraryStop], context: &ExecutionContext, index: usize) -> Option<Vec<DayStop>> {
    let mut route: Vec<DayStop> = Vec::new();
    if index > 0 {
        if let Some(anchor) = &context.anchor_location {
            route.push(DayStop::new(anchor.name.clone(), anchor.coordinates, 0.0));
        }
    }
    route.extend(stops.iter().filter_map(|s| {
        s.coordinates
            .map(|c| DayStop::new(s.name.clone(), c, s.dwell_minutes))
    }));
    let has_visit = stops
        .iter()
        .any(|s| s.coordinates.is_some() && s.category != Category::Accommodation);
    has_visit.then_some(route)
}

fn activity_dwell(name: &str, activities: &[CanonicalRecommendation], cfg: &AppConfig) -> f64 {
    activities
        .iter()
        .find(|a| a.name == name)
        .and_then(|a| match &a.category_metadata {
            CategoryMetadata::Activity {
                duration_minutes: Some(minutes),
                ..
            } => Some(*minutes as f64),
            _ => None,
        })
        .unwrap_or(cfg.geo.dwell_minutes.activity)
}

/// 优先选未用过且离当天中心最近的餐厅；没有坐标可比时按天轮换
fn pick_restaurant(
    restaurants: &[CanonicalRecommendation],
    center: Option<Coordinates>,
    used: &[usize],
    day_index: usize,
) -> Option<usize> {
    if restaurants.is_empty() {
        return None;
    }
    let nearest = |allow_used: bool| {
        center.and_then(|center| {
            restaurants
                .iter()
                .enumerate()
                .filter(|(i, _)| allow_used || !used.contains(i))
                .filter_map(|(i, r)| r.coordinates().map(|c| (i, haversine_km(center, c))))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
        })
    };
    nearest(false)
        .or_else(|| nearest(true))
        .or(Some(day_index % restaurants.len()))
}

fn flight_time(flight: &CanonicalRecommendation, departure: bool) -> String {
    match &flight.category_metadata {
        CategoryMetadata::Flight {
            departure_time,
            arrival_time,
            ..
        } => {
            let time = if departure { departure_time } else { arrival_time };
            time.as_ref().map(|t| format!(" {t}")).unwrap_or_default()
        }
        _ => String::new(),
    }
}
