//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WAYFARER__*` 覆盖（双下划线表示嵌套，如 `WAYFARER__GEO__CLUSTER_RADIUS_KM=1.5`）。
//! 所有启发式常量（聚类半径、每公里分钟数、扣分、权重）都集中在这里，而不是散落在算法代码中。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::Category;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerSection,
    pub agents: AgentsSection,
    pub normalize: NormalizeSection,
    pub geo: GeoSection,
    pub budget: BudgetSection,
    pub confidence: ConfidenceSection,
    pub persistence: PersistenceSection,
}

/// [scheduler] 段：Agent 边界上的超时与重试（调度器本身不重试）
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// 单个 Agent 调用超时（秒）
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
    /// 额外重试次数（0 表示不重试）
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// 线性退避基数（毫秒）
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_agent_timeout_secs() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            agent_timeout_secs: default_agent_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// [agents] 段：按角色配置 HTTP 端点；未配置的角色使用本地 Mock
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentsSection {
    /// 角色名（flight / accommodation / activity / restaurant）-> URL
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
}

/// [normalize] 段：缺省置信度的启发式参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeSection {
    pub base_confidence: f64,
    pub high_rating_threshold: f64,
    pub high_rating_bonus: f64,
    pub review_count_threshold: u64,
    pub review_count_bonus: f64,
    pub priced_bonus: f64,
    pub located_bonus: f64,
}

impl Default for NormalizeSection {
    fn default() -> Self {
        Self {
            base_confidence: 0.7,
            high_rating_threshold: 4.0,
            high_rating_bonus: 0.1,
            review_count_threshold: 100,
            review_count_bonus: 0.1,
            priced_bonus: 0.05,
            located_bonus: 0.05,
        }
    }
}

/// [geo] 段：聚类、覆盖率、可行性评分
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoSection {
    /// 贪心聚类的吸收半径（公里）
    pub cluster_radius_km: f64,
    /// 覆盖率统计半径：簇成员距锚点不超过此值即视为覆盖
    pub coverage_radius_km: f64,
    /// 注入给位置相关 Agent 的「距酒店最大距离」
    pub max_distance_from_hotel_km: f64,
    /// 每个可行性问题扣除的分数
    pub issue_penalty: u32,
    /// 每日可用小时数
    pub available_hours: f64,
    /// 绕路判定阈值
    pub backtrack_ratio: f64,
    /// 每天最多安排的活动数
    pub max_activities_per_day: usize,
    pub style_ceilings: StyleCeilingsSection,
    pub dwell_minutes: DwellSection,
    pub modes: TravelModesSection,
}

impl Default for GeoSection {
    fn default() -> Self {
        Self {
            cluster_radius_km: 2.0,
            coverage_radius_km: 5.0,
            max_distance_from_hotel_km: 5.0,
            issue_penalty: 15,
            available_hours: 10.0,
            backtrack_ratio: 1.5,
            max_activities_per_day: 3,
            style_ceilings: StyleCeilingsSection::default(),
            dwell_minutes: DwellSection::default(),
            modes: TravelModesSection::default(),
        }
    }
}

/// [geo.style_ceilings] 段：按出行风格的每日交通时间上限（分钟）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StyleCeilingsSection {
    pub relaxed: f64,
    pub moderate: f64,
    pub active: f64,
    pub intensive: f64,
}

impl Default for StyleCeilingsSection {
    fn default() -> Self {
        Self {
            relaxed: 120.0,
            moderate: 180.0,
            active: 240.0,
            intensive: 300.0,
        }
    }
}

/// [geo.dwell_minutes] 段：每类停留点的预估停留时间
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DwellSection {
    pub flight: f64,
    pub accommodation: f64,
    pub activity: f64,
    pub restaurant: f64,
}

impl Default for DwellSection {
    fn default() -> Self {
        Self {
            flight: 0.0,
            accommodation: 0.0,
            activity: 120.0,
            restaurant: 90.0,
        }
    }
}

impl DwellSection {
    pub fn for_category(&self, category: Category) -> f64 {
        match category {
            Category::Flight => self.flight,
            Category::Accommodation => self.accommodation,
            Category::Activity => self.activity,
            Category::Restaurant => self.restaurant,
        }
    }
}

/// 单个交通方式的参数：每公里分钟数与可行性上限
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ModeProfile {
    pub minutes_per_km: f64,
    pub max_km: f64,
    pub max_minutes: f64,
}

impl ModeProfile {
    const fn new(minutes_per_km: f64, max_km: f64, max_minutes: f64) -> Self {
        Self {
            minutes_per_km,
            max_km,
            max_minutes,
        }
    }
}

/// [geo.modes] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TravelModesSection {
    pub walking: ModeProfile,
    pub cycling: ModeProfile,
    pub transit: ModeProfile,
    pub taxi: ModeProfile,
    pub rideshare: ModeProfile,
    pub driving: ModeProfile,
    pub metro: ModeProfile,
}

impl Default for TravelModesSection {
    fn default() -> Self {
        Self {
            walking: ModeProfile::new(12.0, 3.0, 45.0),
            cycling: ModeProfile::new(4.0, 10.0, 45.0),
            transit: ModeProfile::new(3.0, 30.0, 90.0),
            taxi: ModeProfile::new(2.4, 50.0, 90.0),
            rideshare: ModeProfile::new(2.4, 50.0, 90.0),
            driving: ModeProfile::new(2.0, 150.0, 180.0),
            metro: ModeProfile::new(2.5, 25.0, 60.0),
        }
    }
}

/// 按类别的浮点参数（权重、预算占比）
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CategoryWeights {
    pub flight: f64,
    pub accommodation: f64,
    pub activity: f64,
    pub restaurant: f64,
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Flight => self.flight,
            Category::Accommodation => self.accommodation,
            Category::Activity => self.activity,
            Category::Restaurant => self.restaurant,
        }
    }
}

/// [budget] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetSection {
    /// 0 表示全部计入
    pub flight_top_n: usize,
    pub accommodation_top_n: usize,
    pub activity_top_n: usize,
    pub restaurant_top_n: usize,
    /// 超出提示预算的比例达到该值时给出警告
    pub warn_ratio: f64,
    /// 超出比例达到该值时升级（计入置信度扣分）
    pub escalate_ratio: f64,
    /// 只有总预算时，按此占比拆分到各类别
    pub shares: CategoryWeights,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            flight_top_n: 0,
            accommodation_top_n: 0,
            activity_top_n: 3,
            restaurant_top_n: 3,
            warn_ratio: 0.10,
            escalate_ratio: 0.20,
            shares: CategoryWeights {
                flight: 0.35,
                accommodation: 0.35,
                activity: 0.15,
                restaurant: 0.15,
            },
        }
    }
}

impl BudgetSection {
    pub fn top_n(&self, category: Category) -> usize {
        match category {
            Category::Flight => self.flight_top_n,
            Category::Accommodation => self.accommodation_top_n,
            Category::Activity => self.activity_top_n,
            Category::Restaurant => self.restaurant_top_n,
        }
    }
}

/// [confidence] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceSection {
    pub weights: CategoryWeights,
    /// 覆盖率超过该百分比后开始线性加分
    pub coverage_bonus_threshold: f64,
    pub coverage_bonus_max: f64,
    pub within_budget_bonus: f64,
    pub over_budget_penalty: f64,
    pub failed_agent_penalty: f64,
}

impl Default for ConfidenceSection {
    fn default() -> Self {
        Self {
            weights: CategoryWeights {
                flight: 0.30,
                accommodation: 0.30,
                activity: 0.25,
                restaurant: 0.15,
            },
            coverage_bonus_threshold: 50.0,
            coverage_bonus_max: 0.05,
            within_budget_bonus: 0.05,
            over_budget_penalty: 0.1,
            failed_agent_penalty: 0.1,
        }
    }
}

/// [persistence] 段：配置 sqlite_path 时使用 SQLite，否则使用内存存储
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PersistenceSection {
    pub sqlite_path: Option<PathBuf>,
}

/// 从 config 目录加载配置，环境变量 WAYFARER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WAYFARER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WAYFARER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
