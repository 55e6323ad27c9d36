#![forbid(unsafe_code)]

//! Value formatting for displayed text.
//!
//! | `data-format` | Output for `1234.5` |
//! |---------------|---------------------|
//! | `currency` | `$1,234.50` |
//! | `number` | `1,234.50` |
//! | `integer` | `1,235` |
//! | `percentage` | `1235%` |
//! | `text` | `1234.5` |
//! | absent | currency for money-like properties, text otherwise |

use nxt_attr::eval::{as_number, display_string};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayFormat {
    #[default]
    Auto,
    Currency,
    Number,
    Integer,
    Percentage,
    Text,
}

impl DisplayFormat {
    /// Parse a `data-format` value. Unknown names fall back to `Auto`.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("currency" | "price") => Self::Currency,
            Some("number" | "decimal") => Self::Number,
            Some("integer" | "int") => Self::Integer,
            Some("percentage" | "percent") => Self::Percentage,
            Some("text" | "raw") => Self::Text,
            _ => Self::Auto,
        }
    }
}

const MONEY_PROPERTIES: &[&str] = &[
    "price", "total", "subtotal", "tax", "shipping", "discount", "savings", "amount", "cost", "retail",
];

/// Whether the last path segment names a monetary amount.
#[must_use]
pub fn is_money_property(property: &str) -> bool {
    let last = property.rsplit('.').next().unwrap_or(property).to_ascii_lowercase();
    MONEY_PROPERTIES.iter().any(|m| last == *m || last.ends_with(m))
}

/// Symbol and minor-unit digits for an ISO currency code.
#[must_use]
pub fn currency_symbol(code: &str) -> (Option<&'static str>, usize) {
    match code {
        "USD" | "CAD" | "AUD" | "NZD" | "MXN" => (Some("$"), 2),
        "EUR" => (Some("€"), 2),
        "GBP" => (Some("£"), 2),
        "JPY" => (Some("¥"), 0),
        "INR" => (Some("₹"), 2),
        _ => (None, 2),
    }
}

/// `1234.5` → `1,234.50` (with `decimals = 2`).
#[must_use]
pub fn format_number(amount: f64, decimals: usize) -> String {
    let rendered = format!("{:.*}", decimals, amount.abs());
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rendered.as_str(), None),
    };
    let mut out = String::with_capacity(rendered.len() + rendered.len() / 3 + 1);
    if amount < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `42.5`, `USD` → `$42.50`; unknown codes render as `CHF 42.50`.
#[must_use]
pub fn format_currency(amount: f64, code: &str) -> String {
    let (symbol, decimals) = currency_symbol(code);
    let number = format_number(amount, decimals);
    let (sign, digits) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number.as_str()),
    };
    match symbol {
        Some(symbol) => format!("{sign}{symbol}{digits}"),
        None => format!("{sign}{code} {digits}"),
    }
}

/// Render a resolved value. Missing values render as an empty string.
#[must_use]
pub fn render_value(value: Option<&Value>, format: DisplayFormat, property: &str, currency: &str) -> String {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return String::new();
    };
    let format = match format {
        DisplayFormat::Auto if is_money_property(property) => DisplayFormat::Currency,
        DisplayFormat::Auto => DisplayFormat::Text,
        other => other,
    };
    let number = as_number(value).filter(|_| !value.is_boolean());
    match (format, number) {
        (DisplayFormat::Currency, Some(n)) => format_currency(n, currency),
        (DisplayFormat::Number, Some(n)) => format_number(n, 2),
        (DisplayFormat::Integer, Some(n)) => format_number(n.round(), 0),
        (DisplayFormat::Percentage, Some(n)) => format!("{}%", format_number(n.round(), 0).replace(',', "")),
        _ => display_string(value),
    }
}
