use chrono::{DateTime, Utc};
use chrono_tz::Asia::Dhaka;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// The order form payload as posted by the landing page.
///
/// Values are carried through untouched, whatever their JSON type. A missing
/// or `null` text field becomes `""`, a missing or `null` number becomes `0`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    #[serde(default = "empty_text", deserialize_with = "null_as_empty_text")]
    pub name: Value,
    #[serde(default = "empty_text", deserialize_with = "null_as_empty_text")]
    pub mobile: Value,
    #[serde(default = "empty_text", deserialize_with = "null_as_empty_text")]
    pub address: Value,
    #[serde(default = "zero", deserialize_with = "null_as_zero")]
    pub quantity: Value,
    #[serde(default = "zero", deserialize_with = "null_as_zero")]
    pub total_price: Value,
}

fn empty_text() -> Value {
    Value::String(String::new())
}

fn zero() -> Value {
    json!(0)
}

fn null_as_empty_text<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.unwrap_or_else(empty_text))
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.unwrap_or_else(zero))
}

/// Strings as their contents, anything else as JSON text.
pub fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A number, or a string holding one.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// An order stamped at handling time. Lives for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub placed_at: String,
    pub submission: OrderSubmission,
}

impl OrderRecord {
    pub fn new(submission: OrderSubmission, now: DateTime<Utc>) -> Self {
        Self {
            placed_at: format_placed_at(now),
            submission,
        }
    }

    /// One spreadsheet row: time, name, mobile, address, quantity, total.
    pub fn ledger_row(&self) -> Vec<Value> {
        let s = &self.submission;
        vec![
            json!(self.placed_at),
            s.name.clone(),
            s.mobile.clone(),
            s.address.clone(),
            s.quantity.clone(),
            s.total_price.clone(),
        ]
    }

    pub fn email_subject(&self) -> String {
        format!(
            "New Order from {} - {} Tk",
            as_text(&self.submission.name),
            as_text(&self.submission.total_price)
        )
    }

    pub fn email_html(&self) -> String {
        let s = &self.submission;
        format!(
            "<h2>New Order Received</h2>\n\
             <p><strong>Time:</strong> {}</p>\n\
             <p><strong>Name:</strong> {}</p>\n\
             <p><strong>Mobile:</strong> {}</p>\n\
             <p><strong>Address:</strong> {}</p>\n\
             <p><strong>Quantity:</strong> {}</p>\n\
             <p><strong>Total Price:</strong> {} Tk</p>\n",
            self.placed_at,
            escape_html(&as_text(&s.name)),
            escape_html(&as_text(&s.mobile)),
            escape_html(&as_text(&s.address)),
            escape_html(&as_text(&s.quantity)),
            escape_html(&as_text(&s.total_price)),
        )
    }
}

/// Wall-clock time in Dhaka, in the same shape as an en-US locale string.
pub fn format_placed_at(now: DateTime<Utc>) -> String {
    now.with_timezone(&Dhaka)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
