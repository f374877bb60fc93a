// Batch correction between attempts

use std::collections::HashSet;

use tracing::debug;

use crate::application::driver::classify::{Disposition, RowVerdict};
use crate::domain::{JurisdictionDescriptor, RecordId, SubmissionRecord};
use crate::port::RejectedRow;

/// The batch to re-encode plus what was changed to get there
#[derive(Debug, Clone, Default)]
pub struct Correction {
    pub records: Vec<SubmissionRecord>,
    pub removed: Vec<RejectedRow>,
    /// (record, new signer)
    pub rotated: Vec<(RecordId, String)>,
    /// Verdicts that matched no record in the batch
    pub unmatched: Vec<RowVerdict>,
}

impl Correction {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty() || !self.rotated.is_empty()
    }
}

/// Next signer in round-robin order; index 1 when `current` is not a candidate
pub fn next_signer(current: Option<&str>, candidates: &[String]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let position = current.and_then(|c| {
        candidates
            .iter()
            .position(|candidate| candidate.trim().eq_ignore_ascii_case(c.trim()))
    });
    let next = match position {
        Some(i) => (i + 1) % candidates.len(),
        None => 1 % candidates.len(),
    };
    Some(candidates[next].clone())
}

/// Resolve a verdict to a record index: row number first, reference as fallback
fn locate(
    descriptor: &JurisdictionDescriptor,
    records: &[SubmissionRecord],
    verdict: &RowVerdict,
) -> Option<usize> {
    let by_row = descriptor
        .row_numbering
        .record_index(verdict.row_number)
        .filter(|&i| i < records.len());
    let by_reference = || {
        (!verdict.reference.is_empty())
            .then(|| {
                records
                    .iter()
                    .position(|r| r.record_id.eq_ignore_ascii_case(verdict.reference.trim()))
            })
            .flatten()
    };

    match by_row {
        Some(i) if verdict.reference.is_empty() => Some(i),
        Some(i) if records[i].record_id.eq_ignore_ascii_case(verdict.reference.trim()) => Some(i),
        // Row number and reference disagree; trust the reference when it resolves
        Some(i) => by_reference().or(Some(i)),
        None => by_reference(),
    }
}

pub fn correct(
    descriptor: &JurisdictionDescriptor,
    records: &[SubmissionRecord],
    verdicts: &[RowVerdict],
    signer_candidates: &[String],
) -> Correction {
    let mut correction = Correction::default();
    let mut remove: HashSet<usize> = HashSet::new();
    let mut rotate: Vec<(usize, String)> = Vec::new();

    for verdict in verdicts {
        let Some(index) = locate(descriptor, records, verdict) else {
            debug!(row = verdict.row_number, reference = %verdict.reference, "Error row matches no record");
            correction.unmatched.push(verdict.clone());
            continue;
        };
        match verdict.disposition {
            Disposition::Remove => {
                if remove.insert(index) {
                    correction.removed.push(RejectedRow {
                        record_id: Some(records[index].record_id.clone()),
                        row_number: verdict.row_number,
                        reference: verdict.reference.clone(),
                        reasons: verdict.messages.clone(),
                    });
                }
            }
            Disposition::RotateSigner => {
                if let Some(signer) =
                    next_signer(records[index].effective_signer(), signer_candidates)
                {
                    rotate.push((index, signer));
                }
            }
        }
    }

    let mut kept: Vec<SubmissionRecord> = records.to_vec();
    for (index, signer) in rotate {
        if remove.contains(&index) {
            continue;
        }
        kept[index].signer_name = Some(signer.clone());
        correction
            .rotated
            .push((kept[index].record_id.clone(), signer));
    }
    correction.records = kept
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !remove.contains(i))
        .map(|(_, r)| r)
        .collect();
    correction
}
