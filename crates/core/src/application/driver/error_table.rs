// Validation error-table parsing
//
// Portals render validation feedback in two shapes:
//  - flat rows: [row, reference, field, severity, message]
//  - grouped: one or more header rows naming the applicant (row number, reference),
//    followed by detail rows [field, severity, message]
// Both are normalized to `ErrorRow`s.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{ErrorRow, Severity};
use crate::port::TableRow;

fn row_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:row|line|record)?\s*(?:no\.?|number|#)?\s*:?\s*(\d{1,6})\s*$")
            .expect("static regex")
    })
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*ref(?:erence)?\s*(?:id|#|no\.?)?\s*:?\s*(\S.*?)\s*$")
            .expect("static regex")
    })
}

fn parse_row_number(cell: &str) -> Option<u32> {
    row_number_re()
        .captures(cell)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_reference(cell: &str) -> Option<String> {
    reference_re()
        .captures(cell)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Default, Clone)]
struct Identity {
    row_number: Option<u32>,
    reference: String,
}

fn is_header(row: &TableRow) -> bool {
    let class = row.class.to_ascii_lowercase();
    if ["applicant", "header", "group"].iter().any(|c| class.contains(c)) {
        return true;
    }
    row.cells.len() < 3
        && row
            .cells
            .iter()
            .any(|c| parse_row_number(c).is_some() || parse_reference(c).is_some())
}

/// Fold a header row into the current identity
fn absorb_header(identity: &mut Identity, row: &TableRow) {
    for cell in row.cells.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if identity.row_number.is_none() {
            if let Some(n) = parse_row_number(cell) {
                identity.row_number = Some(n);
                continue;
            }
        }
        if let Some(reference) = parse_reference(cell) {
            identity.reference = reference;
        } else if identity.reference.is_empty() && parse_row_number(cell).is_none() {
            identity.reference = cell.to_string();
        }
    }
}

fn flat_row(cells: &[String]) -> Option<ErrorRow> {
    let row_number = parse_row_number(&cells[0])?;
    Some(ErrorRow {
        row_number,
        reference_id: cells[1].trim().to_string(),
        field_name: cells[2].trim().to_string(),
        severity: Severity::parse(&cells[3]),
        message: cells[4].trim().to_string(),
    })
}

fn detail_row(identity: &Identity, cells: &[String]) -> Option<ErrorRow> {
    let (field, severity, message) = match cells {
        [field, message] => (field, Severity::Error, message),
        [.., field, severity, message] => (field, Severity::parse(severity), message),
        _ => return None,
    };
    if message.trim().is_empty() {
        return None;
    }
    Some(ErrorRow {
        row_number: identity.row_number.unwrap_or(0),
        reference_id: identity.reference.clone(),
        field_name: field.trim().to_string(),
        severity,
        message: message.trim().to_string(),
    })
}

/// Parse raw table rows (all pages, in order) into de-duplicated error rows
pub fn parse(rows: &[TableRow]) -> Vec<ErrorRow> {
    let mut out = Vec::new();
    let mut seen: HashSet<(String, u32, String)> = HashSet::new();
    let mut identity = Identity::default();
    let mut details_since_header = false;

    for row in rows {
        if row.cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        if is_header(row) {
            if details_since_header {
                identity = Identity::default();
                details_since_header = false;
            }
            absorb_header(&mut identity, row);
            continue;
        }

        let parsed = if row.cells.len() >= 5 {
            // Column-title rows fail the row-number parse and are dropped here
            flat_row(&row.cells)
        } else {
            details_since_header = true;
            detail_row(&identity, &row.cells)
        };

        if let Some(error) = parsed {
            let key = (
                error.reference_id.clone(),
                error.row_number,
                error.message.clone(),
            );
            if seen.insert(key) {
                out.push(error);
            }
        }
    }
    out
}
