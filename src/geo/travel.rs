//! 交通时间估算与每日可行性评分
//!
//! 交通时间 = 距离 × 该方式的每公里分钟数；每种方式有距离与时长上限，超出即标记为不可行。
//! 每日评分从 100 开始，每个问题扣 `issue_penalty` 分，最低 0。

use serde::{Deserialize, Serialize};

use super::distance::haversine_km;
use super::Coordinates;
use crate::config::{GeoSection, ModeProfile, StyleCeilingsSection, TravelModesSection};

/// 交通方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Walking,
    Cycling,
    Transit,
    Taxi,
    Rideshare,
    Driving,
    Metro,
}

impl TravelMode {
    pub fn profile(self, modes: &TravelModesSection) -> ModeProfile {
        match self {
            TravelMode::Walking => modes.walking,
            TravelMode::Cycling => modes.cycling,
            TravelMode::Transit => modes.transit,
            TravelMode::Taxi => modes.taxi,
            TravelMode::Rideshare => modes.rideshare,
            TravelMode::Driving => modes.driving,
            TravelMode::Metro => modes.metro,
        }
    }
}

/// 出行风格，决定每日交通时间上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TravelStyle {
    Relaxed,
    #[default]
    Moderate,
    Active,
    Intensive,
}

impl TravelStyle {
    pub fn ceiling_minutes(self, ceilings: &StyleCeilingsSection) -> f64 {
        match self {
            TravelStyle::Relaxed => ceilings.relaxed,
            TravelStyle::Moderate => ceilings.moderate,
            TravelStyle::Active => ceilings.active,
            TravelStyle::Intensive => ceilings.intensive,
        }
    }
}

/// 一天中的一个停留点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStop {
    pub name: String,
    pub coordinates: Coordinates,
    pub dwell_minutes: f64,
}

impl DayStop {
    pub fn new(name: impl Into<String>, coordinates: Coordinates, dwell_minutes: f64) -> Self {
        Self {
            name: name.into(),
            coordinates,
            dwell_minutes,
        }
    }
}

/// 相邻两站之间的路段估算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEstimate {
    pub from: String,
    pub to: String,
    pub mode: TravelMode,
    pub distance_km: f64,
    pub minutes: f64,
    pub feasible: bool,
}

/// 连续三站的绕路标记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktrackFlag {
    pub from: String,
    pub via: String,
    pub to: String,
    /// 起点与终点重合时为无穷大（JSON 中为 null）
    pub detour_ratio: f64,
}

/// 可行性问题，每个扣一次分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeasibilityIssue {
    InfeasibleSegment {
        from: String,
        to: String,
        distance_km: f64,
        minutes: f64,
    },
    TravelOverStyleCeiling {
        travel_minutes: f64,
        ceiling_minutes: f64,
    },
    ExceedsAvailableHours {
        total_minutes: f64,
        available_minutes: f64,
    },
    Backtracking {
        via: String,
        detour_ratio: f64,
    },
}

/// 每日可行性结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayFeasibility {
    pub score: u32,
    pub total_travel_minutes: f64,
    pub total_dwell_minutes: f64,
    pub segments: Vec<SegmentEstimate>,
    pub issues: Vec<FeasibilityIssue>,
}

impl DayFeasibility {
    pub fn is_feasible(&self) -> bool {
        self.issues.is_empty()
    }
}

/// 估算单个路段
pub fn estimate_segment(
    from: &DayStop,
    to: &DayStop,
    mode: TravelMode,
    modes: &TravelModesSection,
) -> SegmentEstimate {
    let profile = mode.profile(modes);
    let distance_km = haversine_km(from.coordinates, to.coordinates);
    let minutes = distance_km * profile.minutes_per_km;
    SegmentEstimate {
        from: from.name.clone(),
        to: to.name.clone(),
        mode,
        distance_km,
        minutes,
        feasible: distance_km <= profile.max_km && minutes <= profile.max_minutes,
    }
}

/// 对每组连续三站计算 (leg1 + leg2) / direct，超过阈值即标记
pub fn detect_backtracking(stops: &[DayStop], threshold: f64) -> Vec<BacktrackFlag> {
    stops
        .windows(3)
        .filter_map(|w| {
            let leg1 = haversine_km(w[0].coordinates, w[1].coordinates);
            let leg2 = haversine_km(w[1].coordinates, w[2].coordinates);
            let direct = haversine_km(w[0].coordinates, w[2].coordinates);
            let travelled = leg1 + leg2;

            let ratio = if direct < 1e-6 {
                if travelled < 1e-6 {
                    return None;
                }
                f64::INFINITY
            } else {
                travelled / direct
            };

            (ratio > threshold).then(|| BacktrackFlag {
                from: w[0].name.clone(),
                via: w[1].name.clone(),
                to: w[2].name.clone(),
                detour_ratio: ratio,
            })
        })
        .collect()
}

/// 计算一天的可行性评分
pub fn daily_feasibility(
    stops: &[DayStop],
    mode: TravelMode,
    style: TravelStyle,
    geo: &GeoSection,
) -> DayFeasibility {
    let segments: Vec<SegmentEstimate> = stops
        .windows(2)
        .map(|w| estimate_segment(&w[0], &w[1], mode, &geo.modes))
        .collect();

    let total_travel_minutes: f64 = segments.iter().map(|s| s.minutes).sum();
    let total_dwell_minutes: f64 = stops.iter().map(|s| s.dwell_minutes).sum();
    let mut issues = Vec::new();

    for seg in segments.iter().filter(|s| !s.feasible) {
        issues.push(FeasibilityIssue::InfeasibleSegment {
            from: seg.from.clone(),
            to: seg.to.clone(),
            distance_km: seg.distance_km,
            minutes: seg.minutes,
        });
    }

    let ceiling = style.ceiling_minutes(&geo.style_ceilings);
    if total_travel_minutes > ceiling {
        issues.push(FeasibilityIssue::TravelOverStyleCeiling {
            travel_minutes: total_travel_minutes,
            ceiling_minutes: ceiling,
        });
    }

    let available = geo.available_hours * 60.0;
    let total = total_travel_minutes + total_dwell_minutes;
    if total > available {
        issues.push(FeasibilityIssue::ExceedsAvailableHours {
            total_minutes: total,
            available_minutes: available,
        });
    }

    for flag in detect_backtracking(stops, geo.backtrack_ratio) {
        issues.push(FeasibilityIssue::Backtracking {
            via: flag.via,
            detour_ratio: flag.detour_ratio,
        });
    }

    let penalty = geo.issue_penalty.saturating_mul(issues.len() as u32);
    DayFeasibility {
        score: 100u32.saturating_sub(penalty),
        total_travel_minutes,
        total_dwell_minutes,
        segments,
        issues,
    }
}
