//! 按角色的形态映射表
//!
//! 每个角色可能返回的原始形态都登记在 SHAPE_TABLE 中：按标记字段识别形态，
//! 再用对应的 serde 结构体解码为中间草稿 [`Draft`]。任何形态都不匹配时返回
//! `NormalizationError::UnknownShape`，而不是静默落空。

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::coerce::{
    coerce_amount, coerce_confidence, coerce_price, coerce_rating, PriceParts, RatingParts,
};
use super::types::{CanonicalRecommendation, CategoryMetadata, Location};
use super::NormalizationError;
use crate::core::Category;
use crate::geo::Coordinates;

/// 已知的原始形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// 已经是规范记录（保证归一化幂等）
    Canonical,
    FlightOffer,
    HotelListing,
    ActivityListing,
    RestaurantListing,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Canonical => "canonical",
            ShapeKind::FlightOffer => "flight_offer",
            ShapeKind::HotelListing => "hotel_listing",
            ShapeKind::ActivityListing => "activity_listing",
            ShapeKind::RestaurantListing => "restaurant_listing",
        }
    }
}

struct ShapeSpec {
    /// None 表示适用于所有角色
    category: Option<Category>,
    kind: ShapeKind,
    markers: &'static [&'static str],
}

const SHAPE_TABLE: &[ShapeSpec] = &[
    ShapeSpec {
        category: None,
        kind: ShapeKind::Canonical,
        markers: &["name", "price", "rating", "confidence", "category_metadata"],
    },
    ShapeSpec {
        category: Some(Category::Flight),
        kind: ShapeKind::FlightOffer,
        markers: &["airline"],
    },
    ShapeSpec {
        category: Some(Category::Flight),
        kind: ShapeKind::FlightOffer,
        markers: &["carrier"],
    },
    ShapeSpec {
        category: Some(Category::Accommodation),
        kind: ShapeKind::HotelListing,
        markers: &["name"],
    },
    ShapeSpec {
        category: Some(Category::Accommodation),
        kind: ShapeKind::HotelListing,
        markers: &["hotel_name"],
    },
    ShapeSpec {
        category: Some(Category::Activity),
        kind: ShapeKind::ActivityListing,
        markers: &["name"],
    },
    ShapeSpec {
        category: Some(Category::Activity),
        kind: ShapeKind::ActivityListing,
        markers: &["title"],
    },
    ShapeSpec {
        category: Some(Category::Restaurant),
        kind: ShapeKind::RestaurantListing,
        markers: &["name"],
    },
];

/// 识别形态：按表顺序取第一个标记字段全部存在的条目
pub fn detect_shape(category: Category, obj: &Map<String, Value>) -> Option<ShapeKind> {
    SHAPE_TABLE
        .iter()
        .filter(|entry| entry.category.map_or(true, |c| c == category))
        .find(|entry| entry.markers.iter().all(|m| obj.contains_key(*m)))
        .map(|entry| entry.kind)
}

/// 解码后的中间草稿，由 Normalizer 完成强制转换与校验
#[derive(Debug, Clone)]
pub struct Draft {
    pub name: String,
    pub description: Option<String>,
    pub price: PriceParts,
    /// 形态级别的币种（与价格对象中的币种二选一）
    pub currency: Option<String>,
    pub rating: RatingParts,
    pub location: Location,
    pub confidence: Option<f64>,
    pub confidence_reasoning: Option<String>,
    pub metadata: CategoryMetadata,
    pub external_ids: BTreeMap<String, String>,
    pub images: Vec<String>,
}

/// 原生形态的字段别名组，首项为结构体字段名；None 表示所有原生形态共用
const FIELD_ALIASES: &[(Option<ShapeKind>, &[&str])] = &[
    (None, &["review_count", "reviews", "num_reviews"]),
    (None, &["confidence", "confidence_score"]),
    (None, &["images", "photos"]),
    (Some(ShapeKind::FlightOffer), &["airline", "carrier"]),
    (Some(ShapeKind::FlightOffer), &["departure_time", "departure"]),
    (Some(ShapeKind::FlightOffer), &["arrival_time", "arrival"]),
    (Some(ShapeKind::FlightOffer), &["cabin_class", "cabin"]),
    (Some(ShapeKind::HotelListing), &["name", "hotel_name"]),
    (Some(ShapeKind::HotelListing), &["price_per_night", "price"]),
    (Some(ShapeKind::HotelListing), &["property_type", "type"]),
    (Some(ShapeKind::ActivityListing), &["name", "title"]),
    (Some(ShapeKind::ActivityListing), &["activity_type", "category"]),
    (Some(ShapeKind::RestaurantListing), &["price", "average_cost"]),
    (Some(ShapeKind::RestaurantListing), &["cuisine", "cuisines"]),
];

/// 同一字段出现多个别名时只保留组内最靠前的一个，避免 serde 报 duplicate field
fn resolve_aliases(kind: ShapeKind, obj: &Map<String, Value>) -> Value {
    let mut obj = obj.clone();
    if kind != ShapeKind::Canonical {
        for (shape, group) in FIELD_ALIASES {
            if shape.map_or(false, |s| s != kind) {
                continue;
            }
            let mut present = group.iter().filter(|key| obj.contains_key(**key));
            if present.next().is_some() {
                let extra: Vec<&str> = present.copied().collect();
                for key in extra {
                    obj.remove(key);
                }
            }
        }
    }
    Value::Object(obj)
}

/// 识别并解码一条原始推荐
pub fn decode(category: Category, value: &Value) -> Result<Draft, NormalizationError> {
    let obj = value.as_object().ok_or(NormalizationError::NotAnObject)?;
    let kind = detect_shape(category, obj).ok_or_else(|| NormalizationError::UnknownShape {
        category,
        fields: obj.keys().cloned().collect(),
    })?;
    let value = &resolve_aliases(kind, obj);

    match kind {
        ShapeKind::Canonical => parse::<CanonicalRecommendation>(kind, value).map(from_canonical),
        ShapeKind::FlightOffer => parse::<FlightOffer>(kind, value).map(|s| s.into_draft(category)),
        ShapeKind::HotelListing => parse::<HotelListing>(kind, value).map(|s| s.into_draft(category)),
        ShapeKind::ActivityListing => {
            parse::<ActivityListing>(kind, value).map(|s| s.into_draft(category))
        }
        ShapeKind::RestaurantListing => {
            parse::<RestaurantListing>(kind, value).map(|s| s.into_draft(category))
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(kind: ShapeKind, value: &Value) -> Result<T, NormalizationError> {
    serde_json::from_value(value.clone()).map_err(|e| {
        let reason = e.to_string();
        let field = reason
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next())
            .map(str::to_string)
            .unwrap_or_else(|| kind.as_str().to_string());
        NormalizationError::Validation {
            fields: vec![field],
            reason,
        }
    })
}

fn from_canonical(rec: CanonicalRecommendation) -> Draft {
    Draft {
        name: rec.name,
        description: Some(rec.description),
        price: PriceParts {
            amount: coerce_amount(Some(&Value::from(rec.price.amount))),
            currency: Some(rec.price.currency),
            unit: Some(rec.price.unit),
        },
        currency: None,
        rating: RatingParts {
            score: super::coerce::rescale_rating(rec.rating.score, Some(5.0)),
            review_count: Some(rec.rating.review_count),
            source: Some(rec.rating.source),
        },
        location: rec.location,
        // 规范形态同样接受 0-100 的置信度
        confidence: coerce_confidence(Some(&Value::from(rec.confidence.score))),
        confidence_reasoning: Some(rec.confidence.reasoning),
        metadata: rec.category_metadata,
        external_ids: rec.external_ids,
        images: rec.images,
    }
}

/// 各原生形态共享的字段
#[derive(Debug, Default, Deserialize)]
struct ListingCommon {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    rating: Option<Value>,
    #[serde(default, alias = "reviews", alias = "num_reviews")]
    review_count: Option<Value>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    coordinates: Option<Coordinates>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    location: Option<LocationInput>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, alias = "confidence_score")]
    confidence: Option<Value>,
    #[serde(default, alias = "photos")]
    images: Vec<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    booking_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationInput {
    Text(String),
    Detailed(LocationObject),
}

#[derive(Debug, Default, Deserialize)]
struct LocationObject {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    coordinates: Option<Coordinates>,
    #[serde(default, alias = "latitude")]
    lat: Option<f64>,
    #[serde(default, alias = "longitude", alias = "lon")]
    lng: Option<f64>,
}

impl ListingCommon {
    fn into_parts(
        self,
        category: Category,
        price: Option<Value>,
        name: String,
        metadata: CategoryMetadata,
    ) -> Draft {
        let mut rating = coerce_rating(self.rating.as_ref());
        if rating.review_count.is_none() {
            rating.review_count = self.review_count.as_ref().and_then(coerce_count);
        }

        let (loc_address, loc_city, loc_coordinates) = match self.location {
            Some(LocationInput::Text(text)) => (Some(text), None, None),
            Some(LocationInput::Detailed(obj)) => {
                let coords = obj
                    .coordinates
                    .or_else(|| obj.lat.zip(obj.lng).map(|(lat, lng)| Coordinates::new(lat, lng)));
                (obj.address, obj.city, coords)
            }
            None => (None, None, None),
        };
        let coordinates = self
            .coordinates
            .or_else(|| {
                self.latitude
                    .zip(self.longitude)
                    .map(|(lat, lng)| Coordinates::new(lat, lng))
            })
            .or(loc_coordinates);

        let mut external_ids = BTreeMap::new();
        if let Some(id) = self.id {
            let id = match id {
                Value::String(s) => s,
                other => other.to_string(),
            };
            external_ids.insert(format!("{}_agent", category.as_str()), id);
        }
        if let Some(url) = self.booking_url {
            external_ids.insert("booking_url".to_string(), url);
        }

        Draft {
            name,
            description: self.description,
            price: coerce_price(price.as_ref()),
            currency: self.currency,
            rating,
            location: Location {
                address: self.address.or(loc_address),
                city: self.city.or(loc_city),
                coordinates,
            },
            confidence: coerce_confidence(self.confidence.as_ref()),
            confidence_reasoning: None,
            metadata,
            external_ids,
            images: self.images,
        }
    }
}

fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct FlightOffer {
    #[serde(alias = "carrier")]
    airline: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    flight_number: Option<String>,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default, alias = "departure")]
    departure_time: Option<String>,
    #[serde(default, alias = "arrival")]
    arrival_time: Option<String>,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    stops: Option<u32>,
    #[serde(default, alias = "cabin")]
    cabin_class: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(flatten)]
    common: ListingCommon,
}

impl FlightOffer {
    fn into_draft(self, category: Category) -> Draft {
        let name = self.name.clone().unwrap_or_else(|| match &self.flight_number {
            Some(number) => format!("{} {}", self.airline, number),
            None => self.airline.clone(),
        });
        let metadata = CategoryMetadata::Flight {
            airline: self.airline,
            flight_number: self.flight_number,
            origin: self.origin,
            destination: self.destination,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            duration_minutes: self.duration_minutes,
            stops: self.stops.unwrap_or(0),
            cabin_class: self.cabin_class,
        };
        self.common.into_parts(category, self.price, name, metadata)
    }
}

#[derive(Debug, Deserialize)]
struct HotelListing {
    #[serde(alias = "hotel_name")]
    name: String,
    #[serde(default, alias = "price")]
    price_per_night: Option<Value>,
    #[serde(default, alias = "type")]
    property_type: Option<String>,
    #[serde(default)]
    amenities: Vec<String>,
    #[serde(flatten)]
    common: ListingCommon,
}

impl HotelListing {
    fn into_draft(self, category: Category) -> Draft {
        let metadata = CategoryMetadata::Accommodation {
            property_type: self.property_type,
            amenities: self.amenities,
        };
        self.common
            .into_parts(category, self.price_per_night, self.name, metadata)
    }
}

#[derive(Debug, Deserialize)]
struct ActivityListing {
    #[serde(alias = "title")]
    name: String,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default, alias = "category")]
    activity_type: Option<String>,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(flatten)]
    common: ListingCommon,
}

impl ActivityListing {
    fn into_draft(self, category: Category) -> Draft {
        let metadata = CategoryMetadata::Activity {
            activity_type: self.activity_type,
            duration_minutes: self.duration_minutes,
        };
        self.common.into_parts(category, self.price, self.name, metadata)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CuisineInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RestaurantListing {
    name: String,
    #[serde(default, alias = "average_cost")]
    price: Option<Value>,
    #[serde(default, alias = "cuisines")]
    cuisine: Option<CuisineInput>,
    #[serde(default)]
    price_level: Option<Value>,
    #[serde(default)]
    meal_types: Vec<String>,
    #[serde(flatten)]
    common: ListingCommon,
}

impl RestaurantListing {
    fn into_draft(self, category: Category) -> Draft {
        let cuisines = match self.cuisine {
            Some(CuisineInput::One(c)) => vec![c],
            Some(CuisineInput::Many(cs)) => cs,
            None => Vec::new(),
        };
        // 1-4 或 "$$" 形式
        let price_level = match &self.price_level {
            Some(Value::Number(n)) => n.as_u64().map(|v| v.min(4) as u8),
            Some(Value::String(s)) if s.chars().all(|c| matches!(c, '$' | '€' | '£')) => {
                Some(s.chars().count().min(4) as u8)
            }
            _ => None,
        };
        let metadata = CategoryMetadata::Restaurant {
            cuisines,
            price_level,
            meal_types: self.meal_types,
        };
        self.common.into_parts(category, self.price, self.name, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_shapes_per_role() {
        let flight = json!({"airline": "Air France", "price": 420});
        assert_eq!(
            detect_shape(Category::Flight, flight.as_object().unwrap()),
            Some(ShapeKind::FlightOffer)
        );
        let activity = json!({"title": "Seine cruise"});
        assert_eq!(
            detect_shape(Category::Activity, activity.as_object().unwrap()),
            Some(ShapeKind::ActivityListing)
        );
        // 航班角色不接受没有航司的条目
        let hotel_like = json!({"name": "Hotel"});
        assert_eq!(detect_shape(Category::Flight, hotel_like.as_object().unwrap()), None);
    }

    #[test]
    fn test_unknown_shape_is_typed_error() {
        let err = decode(Category::Restaurant, &json!({"title": "Bistro"})).unwrap_err();
        match err {
            NormalizationError::UnknownShape { category, fields } => {
                assert_eq!(category, Category::Restaurant);
                assert_eq!(fields, vec!["title".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            decode(Category::Activity, &json!("not an object")),
            Err(NormalizationError::NotAnObject)
        ));
    }

    #[test]
    fn test_hotel_listing_fields() {
        let draft = decode(
            Category::Accommodation,
            &json!({
                "hotel_name": "Le Marais Boutique",
                "price": {"amount": 180, "currency": "EUR"},
                "rating": 8.8,
                "reviews": 1200,
                "location": {"address": "12 Rue de Rivoli", "lat": 48.8559, "lng": 2.3580},
                "amenities": ["wifi"],
                "id": 991
            }),
        )
        .unwrap();
        assert_eq!(draft.name, "Le Marais Boutique");
        assert_eq!(draft.price.amount, 180.0);
        assert_eq!(draft.rating.score, 4.4);
        assert_eq!(draft.rating.review_count, Some(1200));
        assert_eq!(draft.location.address.as_deref(), Some("12 Rue de Rivoli"));
        assert_eq!(draft.location.coordinates, Some(Coordinates::new(48.8559, 2.3580)));
        assert_eq!(draft.external_ids["accommodation_agent"], "991");
    }

    #[test]
    fn test_field_and_alias_together_prefers_field() {
        let draft = decode(
            Category::Accommodation,
            &json!({
                "name": "Hôtel Lutetia",
                "hotel_name": "Lutetia Paris",
                "price_per_night": 480,
                "price": 999,
                "reviews": 12,
                "review_count": 1200
            }),
        )
        .unwrap();
        assert_eq!(draft.name, "Hôtel Lutetia");
        assert_eq!(draft.price.amount, 480.0);
        assert_eq!(draft.rating.review_count, Some(1200));

        // 只有别名时照常解码
        let alias_only = decode(Category::Activity, &json!({"title": "Seine cruise", "category": "tour"})).unwrap();
        assert_eq!(alias_only.name, "Seine cruise");
    }

    #[test]
    fn test_flight_name_synthesized() {
        let draft = decode(
            Category::Flight,
            &json!({"carrier": "KLM", "flight_number": "KL1234", "price": "€310", "stops": 1}),
        )
        .unwrap();
        assert_eq!(draft.name, "KLM KL1234");
        assert_eq!(draft.price.amount, 310.0);
        assert!(matches!(draft.metadata, CategoryMetadata::Flight { stops: 1, .. }));
    }

    #[test]
    fn test_restaurant_price_level_and_cuisine() {
        let draft = decode(
            Category::Restaurant,
            &json!({"name": "Chez Janou", "cuisine": "French", "price_level": "$$$"}),
        )
        .unwrap();
        match draft.metadata {
            CategoryMetadata::Restaurant {
                cuisines,
                price_level,
                ..
            } => {
                assert_eq!(cuisines, vec!["French".to_string()]);
                assert_eq!(price_level, Some(3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrong_field_type_reports_shape() {
        let err = decode(Category::Activity, &json!({"name": 42})).unwrap_err();
        match err {
            NormalizationError::Validation { fields, .. } => {
                assert_eq!(fields, vec!["activity_listing".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
