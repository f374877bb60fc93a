// Error classification
//
// Blocking error rows are grouped per artifact row. A row whose only complaints are
// about the authorized signer can be fixed by rotating the signer; anything else gets
// the row removed from the batch.

use crate::domain::{ErrorRow, JurisdictionDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SignerOnly,
    Mixed,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    RotateSigner,
    Remove,
}

/// The classification of one artifact row's blocking errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowVerdict {
    pub row_number: u32,
    pub reference: String,
    pub kind: ErrorKind,
    pub disposition: Disposition,
    pub messages: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum RowKey {
    Number(u32),
    Reference(String),
}

fn key_of(row: &ErrorRow) -> RowKey {
    if row.row_number > 0 {
        RowKey::Number(row.row_number)
    } else {
        RowKey::Reference(row.reference_id.clone())
    }
}

/// Group blocking rows by artifact row and decide what to do with each
///
/// Rotation needs somewhere to rotate to, so it requires at least two candidates.
pub fn classify(
    errors: &[ErrorRow],
    descriptor: &JurisdictionDescriptor,
    signer_candidates: usize,
) -> Vec<RowVerdict> {
    let mut groups: Vec<(RowKey, Vec<&ErrorRow>)> = Vec::new();
    for row in errors.iter().filter(|r| r.is_blocking()) {
        let key = key_of(row);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    groups
        .into_iter()
        .map(|(_, rows)| {
            let signer = rows
                .iter()
                .filter(|r| descriptor.is_signer_rejection(&r.message))
                .count();
            let kind = match signer {
                0 => ErrorKind::Other,
                n if n == rows.len() => ErrorKind::SignerOnly,
                _ => ErrorKind::Mixed,
            };
            let disposition = if kind == ErrorKind::SignerOnly && signer_candidates >= 2 {
                Disposition::RotateSigner
            } else {
                Disposition::Remove
            };
            let reference = rows
                .iter()
                .map(|r| r.reference_id.as_str())
                .find(|r| !r.is_empty())
                .unwrap_or_default()
                .to_string();
            RowVerdict {
                row_number: rows[0].row_number,
                reference,
                kind,
                disposition,
                messages: rows.iter().map(|r| r.message.clone()).collect(),
            }
        })
        .collect()
}
