//! Mock Agent（用于测试与演示，无需外部服务）
//!
//! 按固定 fixture 返回推荐，可配置延迟、失败与前 N 次失败后恢复；
//! 每次调用收到的条件会被记录下来，供测试断言上下文传递。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{AgentAdapter, AgentResponse};
use crate::core::{AgentError, Category, EnhancedCriteria};

/// 调用记录（Clone 后共享同一份）
#[derive(Debug, Clone, Default)]
pub struct CallRecorder {
    calls: Arc<Mutex<Vec<EnhancedCriteria>>>,
}

impl CallRecorder {
    pub fn calls(&self) -> Vec<EnhancedCriteria> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn push(&self, criteria: &EnhancedCriteria) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(criteria.clone());
        }
    }
}

pub struct MockAgent {
    category: Category,
    fixtures: Vec<Value>,
    confidence: Option<f64>,
    delay: Option<Duration>,
    error: Option<AgentError>,
    /// 前 N 次调用返回 error，之后正常返回
    fail_first: usize,
    attempts: AtomicUsize,
    recorder: CallRecorder,
}

impl MockAgent {
    pub fn new(category: Category, fixtures: Vec<Value>) -> Self {
        Self {
            category,
            fixtures,
            confidence: None,
            delay: None,
            error: None,
            fail_first: 0,
            attempts: AtomicUsize::new(0),
            recorder: CallRecorder::default(),
        }
    }

    /// 内置的巴黎演示数据
    pub fn demo(category: Category) -> Self {
        Self::new(category, demo_fixtures(category))
    }

    /// 每次调用都失败
    pub fn failing(category: Category, error: AgentError) -> Self {
        let mut agent = Self::new(category, Vec::new());
        agent.error = Some(error);
        agent.fail_first = usize::MAX;
        agent
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 前 n 次调用返回 error
    pub fn failing_first(mut self, n: usize, error: AgentError) -> Self {
        self.fail_first = n;
        self.error = Some(error);
        self
    }

    pub fn recorder(&self) -> CallRecorder {
        self.recorder.clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentAdapter for MockAgent {
    fn category(&self) -> Category {
        self.category
    }

    async fn execute(&self, criteria: &EnhancedCriteria) -> Result<AgentResponse, AgentError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.recorder.push(criteria);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if attempt < self.fail_first {
            if let Some(err) = &self.error {
                return Err(err.clone());
            }
        }

        let mut response = AgentResponse::ok(self.fixtures.clone());
        if let Some(c) = self.confidence {
            response = response.with_confidence(c);
        }
        Ok(response)
    }
}

/// 巴黎演示数据：酒店位于市中心，三个活动中两个在附近、一个在万森纳
pub fn demo_fixtures(category: Category) -> Vec<Value> {
    match category {
        Category::Flight => vec![
            json!({
                "airline": "Air France",
                "flight_number": "AF007",
                "origin": "JFK",
                "destination": "CDG",
                "departure_time": "2026-05-01T18:30:00-04:00",
                "arrival_time": "2026-05-02T07:45:00+02:00",
                "duration_minutes": 435,
                "stops": 0,
                "price": {"amount": 640, "currency": "USD"},
                "confidence": 0.8
            }),
            json!({
                "carrier": "Delta",
                "flight_number": "DL264",
                "origin": "JFK",
                "destination": "CDG",
                "stops": 1,
                "price": "580",
                "rating": 7.9,
                "confidence": 0.8
            }),
        ],
        Category::Accommodation => vec![
            json!({
                "name": "Hôtel de Ville Residence",
                "price_per_night": 210,
                "rating": 9.0,
                "review_count": 860,
                "address": "4 Rue de Rivoli, 75004 Paris",
                "latitude": 48.8566,
                "longitude": 2.3522,
                "amenities": ["wifi", "breakfast"],
                "confidence": 0.9
            }),
            json!({
                "hotel_name": "Canal Saint-Martin Lofts",
                "price": {"amount": 165, "currency": "USD", "unit": "per_night"},
                "rating": {"score": 4.3, "scale": 5, "count": 320},
                "location": {"address": "52 Quai de Valmy, 75010 Paris", "lat": 48.8710, "lng": 2.3640},
                "type": "apartment",
                "confidence": 0.9
            }),
        ],
        Category::Activity => vec![
            json!({
                "name": "Louvre Museum",
                "price": 22,
                "rating": 4.7,
                "review_count": 150000,
                "coordinates": {"lat": 48.8606, "lng": 2.3376},
                "category": "museum",
                "duration_minutes": 180,
                "confidence": 0.7
            }),
            json!({
                "title": "Notre-Dame Cathedral",
                "price": 0,
                "rating": 4.8,
                "latitude": 48.8530,
                "longitude": 2.3499,
                "category": "landmark",
                "confidence": 0.7
            }),
            json!({
                "name": "Château de Vincennes",
                "price": {"amount": 13, "currency": "USD"},
                "rating": 8.6,
                "location": {"city": "Vincennes", "lat": 48.8566, "lng": 2.4612},
                "category": "landmark",
                "confidence": 0.7
            }),
        ],
        Category::Restaurant => vec![
            json!({
                "name": "Chez Janou",
                "cuisine": "Provençal",
                "price": 38,
                "price_level": "$$",
                "rating": 4.4,
                "coordinates": {"lat": 48.8556, "lng": 2.3670},
                "meal_types": ["dinner"],
                "confidence": 0.6
            }),
            json!({
                "name": "Le Bouillon Chartier",
                "cuisines": ["French"],
                "average_cost": 25,
                "price_level": 1,
                "rating": 8.4,
                "coordinates": {"lat": 48.8720, "lng": 2.3430},
                "confidence": 0.6
            }),
            json!({
                "name": "Le Pavillon des Canaux",
                "cuisine": "Café",
                "price": 18,
                "coordinates": {"lat": 48.8890, "lng": 2.3720},
                "confidence": 0.6
            }),
        ],
    }
}
