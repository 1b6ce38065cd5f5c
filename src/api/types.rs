//! Game API response types.
//!
//! Every endpoint answers with the same envelope: a numeric `status` (0 on
//! success), an optional `message` and an endpoint specific `data` payload.
//! Numeric fields are decoded leniently because the backend sends some of
//! them as strings.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::ApiError;

/// Status reported when the envelope carries none.
const MISSING_STATUS: i64 = -1;

/// The JSON envelope shared by all endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default = "missing_status", deserialize_with = "lenient_i64")]
    pub status: i64,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub data: Value,
}

const fn missing_status() -> i64 {
    MISSING_STATUS
}

impl ApiResponse {
    /// Returns `true` when the backend reported success.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }

    /// Decodes the `data` payload.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(T::deserialize(&self.data)?)
    }

    /// Returns `true` when `data` is absent, null or empty.
    #[must_use]
    pub fn data_is_empty(&self) -> bool {
        match &self.data {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(fields) => fields.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// `/user/login` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// `/user/balance` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Balance {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub available_balance: f64,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub play_passes: u32,

    #[serde(default)]
    pub farming: Option<Farming>,
}

/// A farming cycle as reported by balance and `/farm/start`.
#[derive(Debug, Clone, Deserialize)]
pub struct Farming {
    #[serde(deserialize_with = "lenient_i64")]
    pub end_at: i64,
}

/// `/farm/claim` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FarmClaim {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub claim_this_time: f64,
}

/// `/daily/claim` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyClaim {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub today_game: i64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub today_points: f64,
}

/// `/game/claim` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct GameClaim {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub points: f64,
}

/// `/tasks/classmateTask` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarsTask {
    #[serde(deserialize_with = "lenient_i64")]
    pub status: i64,

    #[serde(deserialize_with = "lenient_i64")]
    pub task_id: i64,

    #[serde(default)]
    pub end_time: Option<String>,
}

/// `/tasks/classmateStars` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StarsReward {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub stars: f64,
}

/// One entry of the `/tasks/hidden` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboTask {
    #[serde(deserialize_with = "lenient_i64")]
    pub status: i64,

    #[serde(deserialize_with = "lenient_i64")]
    pub task_id: i64,

    #[serde(default)]
    pub end: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,

    #[serde(default)]
    pub code: Option<Value>,
}

/// One entry of the `/tasks/list` catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "lenient_i64")]
    pub task_id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub end_time: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub wait_second: u64,
}

/// Flattens the task catalog (category name -> task list) into one list.
///
/// Categories that are not lists and entries that do not decode are skipped.
pub fn flatten_catalog(data: &Value) -> Vec<Task> {
    let Value::Object(categories) = data else {
        return Vec::new();
    };

    categories
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|entry| Task::deserialize(entry).ok())
        .collect()
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0.0);
    }
    number_from(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {value}")))
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    lenient_number(deserializer)
}

/// Integer view of a number or numeric string; exact for integers beyond 2^53.
#[allow(clippy::cast_possible_truncation)]
fn integer_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    integer_from(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {value}")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    lenient_number(deserializer).map(|n| n.max(0.0) as u64)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    lenient_number(deserializer).map(|n| n.max(0.0) as u32)
}
