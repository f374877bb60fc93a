// Record Source Port
//
// Canonical employee/employer/screening payloads are owned upstream; the submitter only
// reads them by queue record ID.

use crate::domain::{RecordId, SubmissionRecord};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Load payloads for `ids`; unknown IDs are simply absent from the result
    async fn load(&self, ids: &[RecordId]) -> Result<Vec<SubmissionRecord>>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct InMemoryRecordSource {
        records: Mutex<HashMap<RecordId, SubmissionRecord>>,
    }

    impl InMemoryRecordSource {
        pub fn new(records: impl IntoIterator<Item = SubmissionRecord>) -> Self {
            Self {
                records: Mutex::new(
                    records
                        .into_iter()
                        .map(|r| (r.record_id.clone(), r))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl RecordSource for InMemoryRecordSource {
        async fn load(&self, ids: &[RecordId]) -> Result<Vec<SubmissionRecord>> {
            let records = self.records.lock().unwrap();
            Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
        }
    }
}
