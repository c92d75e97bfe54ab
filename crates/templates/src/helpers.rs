//! Filters and functions available inside templates.
//!
//! Every helper is registered both as a filter (`{{ n|humannumber }}`) and
//! as a function (`{{ humannumber(n) }}`).

use chrono::{DateTime, Utc};
use minijinja::{Environment, Error, ErrorKind, Value};

use jobboard_core::humanize::{humanize_number, humanize_since};

use crate::markdown::markdown_to_html;

macro_rules! register_all {
    ($env:expr, $($name:literal => $f:expr),+ $(,)?) => {
        $(
            $env.add_filter($name, $f);
            $env.add_function($name, $f);
        )+
    };
}

/// Install every helper into `env`.
pub fn register(env: &mut Environment<'static>) {
    register_all!(env,
        "add" => |a: i64, b: i64| checked("add", a.checked_add(b)),
        "sub" => |a: i64, b: i64| checked("sub", a.checked_sub(b)),
        "mul" => |a: i64, b: i64| checked("mul", a.checked_mul(b)),
        "last" => |a: Vec<i64>| a.last().copied().unwrap_or(-1),
        // Already safe for both HTML and JS string contexts.
        "jsescape" => |s: String| Value::from_safe_string(js_escape(&s)),
        "humantime" => |t: String| parse_time(&t).map(|t| humanize_since(t, Utc::now())),
        "humannumber" => |n: i64| humanize_number(n),
        "is_time_before_now" => |t: String| parse_time(&t).map(|t| t < Utc::now()),
        "is_time_after_now" => |t: String| parse_time(&t).map(|t| t > Utc::now()),
        "truncate_name" => |s: String| truncate_name(&s).to_string(),
        "string_title" => |s: String| title_case(&s),
        "replace_dash" => |s: String| s.replace('-', " "),
        "currency_symbol" => |code: String| currency_symbol(&code),
        "markdown" => |s: String| Value::from_safe_string(markdown_to_html(&s)),
    );
}

fn checked(op: &str, result: Option<i64>) -> Result<i64, Error> {
    result.ok_or_else(|| Error::new(ErrorKind::InvalidOperation, format!("integer overflow in {op}")))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("not an RFC3339 timestamp '{s}': {e}")))
}

/// Symbol for an ISO-4217 code; unknown codes fall back to `$`.
pub fn currency_symbol(code: &str) -> &'static str {
    match code {
        "USD" => "$",
        "EUR" => "€",
        "JPY" => "¥",
        "GBP" => "£",
        "AUD" => "A$",
        "CAD" => "C$",
        "CHF" => "Fr",
        "CNY" => "元",
        "HKD" => "HK$",
        "NZD" => "NZ$",
        "SEK" => "kr",
        "KRW" => "₩",
        "SGD" => "S$",
        "NOK" => "kr",
        "MXN" => "MX$",
        "INR" => "₹",
        "RUB" => "₽",
        "ZAR" => "R",
        "TRY" => "₺",
        "BRL" => "R$",
        _ => "$",
    }
}

/// First space-separated word: `"Ada Lovelace"` -> `"Ada"`.
pub fn truncate_name(s: &str) -> &str {
    s.split(' ').next().unwrap_or_default()
}

/// Upper-case the first letter of every word.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace() || (ch.is_ascii_punctuation() && ch != '_');
    }
    out
}

/// Escape `s` for embedding inside a JavaScript string literal.
pub fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' | '>' | '&' | '=' => out.push_str(&format!("\\u{:04X}", ch as u32)),
            c if c.is_control() => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out
}
