// Fixed-width artifacts
//
// Text is uppercased and left aligned, numerics are right aligned and zero padded.
// Anything longer than its column is truncated.

use crate::encoding::layouts::{Align, FixedColumn, FieldSource, Value};
use crate::encoding::sanitize;

fn fit(text: &str, width: usize, align: Align) -> String {
    let truncated: String = text.chars().take(width).collect();
    let pad = width - truncated.chars().count();
    match align {
        Align::Left => format!("{truncated}{}", " ".repeat(pad)),
        Align::Right if truncated.is_empty() => " ".repeat(width),
        Align::Right => format!("{}{truncated}", "0".repeat(pad)),
    }
}

fn field_text(value: Option<Value>, date_pattern: &str) -> String {
    match value {
        None => String::new(),
        // Cents, no decimal point
        Some(Value::Wage(cents)) => cents.max(0).to_string(),
        Some(Value::Flag(b)) => sanitize::flag(b).to_string(),
        Some(v) => sanitize::plain_text(&sanitize::render(&v, date_pattern)).to_uppercase(),
    }
}

pub fn record(columns: &[FixedColumn], src: &FieldSource<'_>, date_pattern: &str) -> String {
    columns
        .iter()
        .map(|c| fit(&field_text(c.field.read(src), date_pattern), c.width, c.align))
        .collect()
}

pub fn render<'a>(
    columns: &[FixedColumn],
    sources: impl Iterator<Item = FieldSource<'a>>,
    date_pattern: &str,
) -> String {
    let mut out = String::new();
    for src in sources {
        out.push_str(&record(columns, &src, date_pattern));
        out.push_str("\r\n");
    }
    out
}
