use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use tracing::debug;

use super::paginate::PageRequest;

/// A query parameter or body field that clients may send either as one
/// comma-separated string or as an already split list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// Trimmed, non-empty items in their original order.
    pub fn items(&self) -> Vec<String> {
        match self {
            ParamValue::One(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            ParamValue::Many(values) => values
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// The scalar view: a plain value, or the first element of a list.
    pub fn first(&self) -> Option<&str> {
        match self {
            ParamValue::One(raw) => Some(raw.as_str()),
            ParamValue::Many(values) => values.first().map(String::as_str),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            ParamValue::Many(values) => values.push(value),
            ParamValue::One(first) => {
                let first = std::mem::take(first);
                *self = ParamValue::Many(vec![first, value]);
            }
        }
    }
}

/// Normalised form of a multi-valued filter. Missing input yields an empty set.
pub fn normalize_set(value: Option<&ParamValue>) -> BTreeSet<String> {
    value.map(|v| v.items().into_iter().collect()).unwrap_or_default()
}

/// Ordered variant used when storing list fields on a meal.
pub fn normalize_list(value: Option<&ParamValue>) -> Vec<String> {
    value.map(ParamValue::items).unwrap_or_default()
}

/// Raw query string, keyed by parameter name.
///
/// Repeated keys (`tags=a&tags=b`) and the bracketed form (`tags[]=a`) both
/// collapse into [`ParamValue::Many`].
#[derive(Debug, Clone, Default)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in pairs {
            let key: String = key.into();
            let value: String = value.into();
            let (key, bracketed) = match key.strip_suffix("[]") {
                Some(stripped) => (stripped.to_string(), true),
                None => (key, false),
            };
            match map.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(if bracketed {
                        ParamValue::Many(vec![value])
                    } else {
                        ParamValue::One(value)
                    });
                }
                Entry::Occupied(mut slot) => slot.get_mut().push(value),
            }
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Trimmed scalar value; blank counts as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(ParamValue::first)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Finite number; anything unparsable counts as absent.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key)
            .and_then(ParamValue::first)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Scalar meal columns that may be filtered by exact equality through
/// otherwise unrecognised query keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityField {
    Category,
    PortionSize,
}

impl EqualityField {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "category" => Some(Self::Category),
            "portionSize" => Some(Self::PortionSize),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::PortionSize => "portion_size",
        }
    }
}

const ENGINE_KEYS: &[&str] = &[
    "search",
    "cuisine",
    "preparedBy",
    "ingredients",
    "tags",
    "dietaryRestrictions",
    "pickupDeliveryOptions",
    "paymentOptions",
    "discountsPromotions",
    "city",
    "state",
    "postalCode",
    "lat",
    "lng",
    "radius",
    "page",
    "limit",
];

/// Location part of a search, validated but not yet interpreted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_m: Option<f64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// Meal search request after normalisation.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub cuisine: Option<String>,
    pub prepared_by: Option<String>,
    pub ingredients: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub dietary_restrictions: BTreeSet<String>,
    pub pickup_delivery_options: BTreeSet<String>,
    pub payment_options: BTreeSet<String>,
    pub discounts_promotions: BTreeSet<String>,
    pub equals: Vec<(EqualityField, String)>,
    pub location: LocationQuery,
    pub page: PageRequest,
}

impl SearchQuery {
    pub fn from_params(params: &QueryParams, max_limit: u32) -> Self {
        let mut equals = Vec::new();
        for key in params.keys() {
            if ENGINE_KEYS.contains(&key) {
                continue;
            }
            match (EqualityField::from_key(key), params.text(key)) {
                (Some(field), Some(value)) => equals.push((field, value)),
                (Some(_), None) => {}
                (None, _) => debug!(key, "ignoring unsupported meal filter"),
            }
        }

        let page = PageRequest::parse(
            params.get("page").and_then(ParamValue::first),
            params.get("limit").and_then(ParamValue::first),
            max_limit,
        );

        Self {
            search: params.text("search"),
            cuisine: params.text("cuisine"),
            prepared_by: params.text("preparedBy"),
            ingredients: normalize_set(params.get("ingredients")),
            tags: normalize_set(params.get("tags")),
            dietary_restrictions: normalize_set(params.get("dietaryRestrictions")),
            pickup_delivery_options: normalize_set(params.get("pickupDeliveryOptions")),
            payment_options: normalize_set(params.get("paymentOptions")),
            discounts_promotions: normalize_set(params.get("discountsPromotions")),
            equals,
            location: LocationQuery {
                lat: params.number("lat").filter(|v| (-90.0..=90.0).contains(v)),
                lng: params.number("lng").filter(|v| (-180.0..=180.0).contains(v)),
                radius_m: params.number("radius").filter(|v| *v >= 0.0),
                city: params.text("city"),
                state: params.text("state"),
                postal_code: params.text("postalCode"),
            },
            page,
        }
    }
}
