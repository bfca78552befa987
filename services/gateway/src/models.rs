use serde::{Deserialize, Deserializer, Serialize};

fn zero() -> String {
    "0".to_string()
}

/// Form-style field: clients send either text or a bare JSON scalar.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

/// Read a string, number or bool as its text form; `null` reads as empty.
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(text)) => text,
        Some(Scalar::Number(number)) => number.to_string(),
        Some(Scalar::Flag(flag)) => flag.to_string(),
        None => String::new(),
    })
}

/// Order entry fields, validated by `OrderTicket::parse`.
#[derive(Debug, Clone, Deserialize)]
pub struct MakeOrderRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub direction: String,
    #[serde(default, rename = "orderType", deserialize_with = "loose_string")]
    pub order_type: String,
    #[serde(default = "zero", deserialize_with = "loose_string")]
    pub price: String,
    #[serde(default = "zero", deserialize_with = "loose_string")]
    pub volume: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MakeOrderResponse {
    pub result: bool,
    pub order_id: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub err_msg: String,
}

impl MakeOrderResponse {
    pub fn accepted(order_id: i64) -> Self {
        Self {
            result: true,
            order_id,
            err_msg: String::new(),
        }
    }

    pub fn rejected(err_msg: impl Into<String>) -> Self {
        Self {
            result: false,
            order_id: -1,
            err_msg: err_msg.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderResponse {
    pub result: bool,
    pub order_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub err_msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryOrderParams {
    #[serde(default)]
    pub order_id: String,
}
