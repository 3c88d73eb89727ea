//! Normalization of catalog records into [`BookDetails`].
//!
//! Every field comes out as a string. Numeric values keep their decimal
//! form, the average rating is fixed to two decimal places, and anything
//! absent or non-numeric becomes `""`.

use domain::BookDetails;
use serde_json::Value;

/// The record a search body refers to: the first element of `docs`.
pub fn first_record(body: &Value) -> Option<&Value> {
    body.get("docs")?.as_array()?.first()
}

/// Build [`BookDetails`] from an Open Library search document.
pub fn normalize_record(record: &Value) -> BookDetails {
    let field = |name: &str| plain_number(record.get(name));

    BookDetails {
        ratings_average: fixed_precision(record.get("ratings_average")),
        ratings_count: field("ratings_count"),
        number_of_pages_median: field("number_of_pages_median"),
        first_publish_year: field("first_publish_year"),
        ratings_count_1: field("ratings_count_1"),
        ratings_count_2: field("ratings_count_2"),
        ratings_count_3: field("ratings_count_3"),
        ratings_count_4: field("ratings_count_4"),
        ratings_count_5: field("ratings_count_5"),
    }
}

/// Format a numeric value with exactly two decimals.
pub fn fixed_precision(value: Option<&Value>) -> String {
    match value.and_then(as_finite_f64) {
        Some(number) => format!("{:.2}", number),
        None => String::new(),
    }
}

/// Format a numeric value in its plain decimal form.
pub fn plain_number(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else if let Some(uint) = number.as_u64() {
                uint.to_string()
            } else {
                match number.as_f64() {
                    Some(float) if float.is_finite() && float.fract() == 0.0 => {
                        format!("{:.0}", float)
                    }
                    Some(float) if float.is_finite() => float.to_string(),
                    _ => String::new(),
                }
            }
        }
        Some(Value::String(text)) if parse_finite(text).is_some() => text.trim().to_string(),
        _ => String::new(),
    }
}

fn as_finite_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|f| f.is_finite()),
        Value::String(text) => parse_finite(text),
        _ => None,
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}
