// Canonical submission records
//
// Upstream (questionnaire + screening) owns these; the submitter only reads them.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::record::RecordId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default)]
    pub county: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_initial: Option<String>,
    pub last_name: String,
    pub ssn: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Address,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Employee {
    /// Age in whole years on `on`
    pub fn age_on(&self, on: NaiveDate) -> Option<i32> {
        let dob = self.date_of_birth?;
        let mut age = on.year() - dob.year();
        if (on.month(), on.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        Some(age)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employer {
    pub id: String,
    pub name: String,
    pub ein: String,
    pub address: Address,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    /// Default authorized signer printed on certification paperwork
    #[serde(default)]
    pub authorized_signer: Option<String>,
    #[serde(default)]
    pub signer_title: Option<String>,
}

/// Eligibility screening outcome for one hire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screening {
    pub id: String,
    /// Free-text target-group categories as named upstream
    #[serde(default)]
    pub categories: Vec<String>,
    pub gave_information_date: Option<NaiveDate>,
    pub offered_date: Option<NaiveDate>,
    pub hired_date: Option<NaiveDate>,
    pub started_date: Option<NaiveDate>,
    /// Starting hourly wage in cents
    pub starting_wage_cents: Option<i64>,
    #[serde(default)]
    pub job_title: Option<String>,
    pub form_8850_signed_date: Option<NaiveDate>,
    #[serde(default)]
    pub felony_conviction_date: Option<NaiveDate>,
    #[serde(default)]
    pub felony_release_date: Option<NaiveDate>,
    #[serde(default)]
    pub unemployment_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub benefits_recipient_name: Option<String>,
    #[serde(default)]
    pub benefits_recipient_city: Option<String>,
}

/// Everything the encoder needs for one queue record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub record_id: RecordId,
    pub employee: Employee,
    pub employer: Employer,
    pub screening: Screening,
    /// Per-record signer; falls back to the employer's authorized signer
    #[serde(default)]
    pub signer_name: Option<String>,
}

impl SubmissionRecord {
    pub fn effective_signer(&self) -> Option<&str> {
        self.signer_name
            .as_deref()
            .or(self.employer.authorized_signer.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
