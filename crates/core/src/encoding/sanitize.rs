// Value normalization shared by every artifact format

use crate::encoding::layouts::Value;

/// Remove characters that would break a delimited row and collapse whitespace
pub fn delimited_text(raw: &str, delimiter: char) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c == delimiter || c == '"' || c == ';' || c.is_control() {
                ' '
            } else {
                c
            }
        })
        .collect();
    collapse_whitespace(&cleaned)
}

/// Control characters out, whitespace collapsed; markup escaping happens later
pub fn plain_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    collapse_whitespace(&cleaned)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Five-digit ZIP, or ZIP+4 rendered as `12345-6789`
pub fn zip(digits: &str) -> String {
    match digits.len() {
        9 => format!("{}-{}", &digits[..5], &digits[5..]),
        n if n > 5 => digits[..5].to_string(),
        _ => digits.to_string(),
    }
}

/// Cents to a dollar amount with two decimals
pub fn wage(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

pub fn flag(value: bool) -> &'static str {
    if value {
        "Y"
    } else {
        "N"
    }
}

/// Render a typed value as text using the jurisdiction's date pattern
pub fn render(value: &Value, date_pattern: &str) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Digits(d) => d.clone(),
        Value::Date(d) => d.format(date_pattern).to_string(),
        Value::Wage(cents) => wage(*cents),
        Value::Flag(b) => flag(*b).to_string(),
    }
}

/// Escape the five XML special characters
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_delimited_text_strips_breaking_chars() {
        assert_eq!(delimited_text("Smith, \"Jr\"\r\n", ','), "Smith Jr");
        assert_eq!(delimited_text("  a\tb  ", ','), "a b");
    }

    #[test]
    fn test_zip_forms() {
        assert_eq!(zip("85004"), "85004");
        assert_eq!(zip("850041234"), "85004-1234");
        assert_eq!(zip("8500412"), "85004");
    }

    #[test]
    fn test_wage() {
        assert_eq!(wage(1250), "12.50");
        assert_eq!(wage(7), "0.07");
    }

    #[test]
    fn test_render_date_pattern() {
        let d = Value::Date(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
        assert_eq!(render(&d, "%m/%d/%Y"), "03/09/2025");
        assert_eq!(render(&d, "%Y%m%d"), "20250309");
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("A&B <x>"), "A&amp;B &lt;x&gt;");
    }
}
