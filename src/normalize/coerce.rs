//! 字段强制转换：价格、评分、置信度
//!
//! 所有函数都是全函数：非法输入落到最近的边界值，而不是报错。

use serde::Deserialize;
use serde_json::Value;

use crate::config::NormalizeSection;

/// 价格对象形态：{amount, currency, unit}
#[derive(Debug, Default, Deserialize)]
struct PriceObject {
    #[serde(default, alias = "value", alias = "total")]
    amount: Option<Value>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    unit: Option<String>,
}

/// 评分对象形态：{score, scale, review_count, source}
#[derive(Debug, Deserialize)]
struct RatingObject {
    #[serde(alias = "value", alias = "average")]
    score: Value,
    #[serde(default, alias = "max", alias = "out_of")]
    scale: Option<f64>,
    #[serde(default, alias = "count", alias = "reviews")]
    review_count: Option<u64>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceParts {
    pub amount: f64,
    pub currency: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RatingParts {
    pub score: f64,
    pub review_count: Option<u64>,
    pub source: Option<String>,
}

/// 数值金额：数字或数字字符串（允许货币符号与千分位），非法或负数为 0
pub fn coerce_amount(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_lenient(s),
        _ => None,
    };
    match raw {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// 价格：裸数字、字符串，或 {amount, currency, unit}
pub fn coerce_price(value: Option<&Value>) -> PriceParts {
    match value {
        Some(Value::Object(_)) => {
            let obj: PriceObject = value
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            PriceParts {
                amount: coerce_amount(obj.amount.as_ref()),
                currency: obj.currency.filter(|c| !c.trim().is_empty()),
                unit: obj.unit.filter(|u| !u.trim().is_empty()),
            }
        }
        other => PriceParts {
            amount: coerce_amount(other),
            currency: None,
            unit: None,
        },
    }
}

/// 评分：0-5 / 0-10 / 0-100 三种刻度，统一到 [0,5]
pub fn coerce_rating(value: Option<&Value>) -> RatingParts {
    match value {
        Some(Value::Number(n)) => RatingParts {
            score: rescale_rating(n.as_f64().unwrap_or(0.0), None),
            ..Default::default()
        },
        Some(Value::String(s)) => {
            let (raw, scale) = match s.split_once('/') {
                Some((score, scale)) => (parse_lenient(score), parse_lenient(scale)),
                None => (parse_lenient(s), None),
            };
            RatingParts {
                score: rescale_rating(raw.unwrap_or(0.0), scale),
                ..Default::default()
            }
        }
        Some(v @ Value::Object(_)) => match serde_json::from_value::<RatingObject>(v.clone()) {
            Ok(obj) => {
                let raw = match &obj.score {
                    Value::Number(n) => n.as_f64().unwrap_or(0.0),
                    Value::String(s) => parse_lenient(s).unwrap_or(0.0),
                    _ => 0.0,
                };
                RatingParts {
                    score: rescale_rating(raw, obj.scale),
                    review_count: obj.review_count,
                    source: obj.source,
                }
            }
            Err(_) => RatingParts::default(),
        },
        _ => RatingParts::default(),
    }
}

/// 按刻度线性缩放到 [0,5]；未给刻度时按数值大小推断，越界取最近边界
pub fn rescale_rating(raw: f64, scale: Option<f64>) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0.0;
    }
    let scale = match scale.filter(|s| s.is_finite() && *s > 0.0) {
        Some(s) => s,
        None if raw <= 5.0 => 5.0,
        None if raw <= 10.0 => 10.0,
        None if raw <= 100.0 => 100.0,
        None => return 5.0,
    };
    round_to(raw * (5.0 / scale), 2).clamp(0.0, 5.0)
}

/// 置信度：0-1 或 0-100（大于 1 视为百分制），缺失或无法解析返回 None
pub fn coerce_confidence(value: Option<&Value>) -> Option<f64> {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_lenient(s),
        _ => None,
    }?;
    if !raw.is_finite() {
        return None;
    }
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    Some(round_to(scaled.clamp(0.0, 1.0), 4))
}

/// 缺省置信度的启发式推导，返回 (score, reasoning)
pub fn heuristic_confidence(
    rating: f64,
    review_count: u64,
    price: f64,
    has_coordinates: bool,
    cfg: &NormalizeSection,
) -> (f64, String) {
    let mut score = cfg.base_confidence;
    let mut reasons = vec![format!("base {:.2}", cfg.base_confidence)];

    if rating > cfg.high_rating_threshold {
        score += cfg.high_rating_bonus;
        reasons.push(format!("rating>{}", cfg.high_rating_threshold));
    }
    if review_count > cfg.review_count_threshold {
        score += cfg.review_count_bonus;
        reasons.push(format!("reviews>{}", cfg.review_count_threshold));
    }
    if price > 0.0 {
        score += cfg.priced_bonus;
        reasons.push("priced".to_string());
    }
    if has_coordinates {
        score += cfg.located_bonus;
        reasons.push("located".to_string());
    }

    (
        round_to(score.clamp(0.0, 1.0), 4),
        format!("derived: {}", reasons.join(", ")),
    )
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn parse_lenient(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok()
}
