// Delimited (CSV-style) artifacts

use crate::encoding::layouts::{Column, Field, FieldSource, Value};
use crate::encoding::sanitize;

fn cell(column: &Column, value: Option<Value>, delimiter: char, date_pattern: &str) -> String {
    let text = match value {
        Some(Value::Digits(d)) if matches!(column.field, Field::Zip | Field::EmployerZip) => {
            sanitize::zip(&d)
        }
        Some(v) => sanitize::delimited_text(&sanitize::render(&v, date_pattern), delimiter),
        None => String::new(),
    };
    if column.quoted {
        format!("\"{text}\"")
    } else {
        text
    }
}

pub fn header(columns: &[Column], delimiter: char) -> String {
    columns
        .iter()
        .map(|c| c.header)
        .collect::<Vec<_>>()
        .join(&delimiter.to_string())
}

pub fn row(columns: &[Column], src: &FieldSource<'_>, delimiter: char, date_pattern: &str) -> String {
    columns
        .iter()
        .map(|c| cell(c, c.field.read(src), delimiter, date_pattern))
        .collect::<Vec<_>>()
        .join(&delimiter.to_string())
}

/// Header line followed by one line per record, CRLF terminated
pub fn render<'a>(
    columns: &[Column],
    sources: impl Iterator<Item = FieldSource<'a>>,
    delimiter: char,
    date_pattern: &str,
) -> String {
    let mut out = header(columns, delimiter);
    out.push_str("\r\n");
    for src in sources {
        out.push_str(&row(columns, &src, delimiter, date_pattern));
        out.push_str("\r\n");
    }
    out
}
