// Format Encoders
//
// Pure, deterministic transforms from canonical submission records to the artifact a
// jurisdiction's batch-upload page accepts. No I/O.

pub mod delimited;
pub mod fixed_width;
pub mod layouts;
pub mod markup;
pub mod sanitize;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::domain::jurisdiction::{self, ArtifactFormat, ArtifactLayout, JurisdictionDescriptor};
use crate::domain::{Employee, Employer, RecordId, Screening, SubmissionRecord, TargetGroup};
use layouts::{Field, FieldSource};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unknown jurisdiction '{0}'")]
    UnknownJurisdiction(String),

    #[error("no records to encode")]
    Empty,

    #[error("{count} records exceeds the {jurisdiction} ceiling of {ceiling}")]
    TooManyRecords {
        jurisdiction: String,
        count: usize,
        ceiling: usize,
    },
}

/// Position of one record inside an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRow {
    pub record_id: RecordId,
    pub signer: Option<String>,
}

/// Serialized batch ready for upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub jurisdiction: String,
    pub format: ArtifactFormat,
    /// Deterministic in the content
    pub file_name: String,
    pub content: String,
    /// Data rows in artifact order
    pub rows: Vec<ArtifactRow>,
}

impl Artifact {
    pub fn record_count(&self) -> usize {
        self.rows.len()
    }

    pub fn bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }
}

impl serde::Serialize for ArtifactFormat {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.extension())
    }
}

/// FNV-1a, enough to give each distinct artifact a distinct file name
fn content_hash(content: &str) -> u64 {
    content.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn sources<'a>(
    records: &'a [SubmissionRecord],
    groups: &'a [BTreeSet<TargetGroup>],
) -> impl Iterator<Item = FieldSource<'a>> {
    records.iter().zip(groups).map(|(r, g)| FieldSource {
        reference: &r.record_id,
        employee: &r.employee,
        employer: Some(&r.employer),
        screening: &r.screening,
        signer: r.effective_signer(),
        groups: g,
    })
}

/// Render `records` in the jurisdiction's format
///
/// The record ceiling is checked before anything is rendered.
pub fn encode(
    jurisdiction_code: &str,
    records: &[SubmissionRecord],
) -> Result<Artifact, EncodeError> {
    let descriptor = jurisdiction::lookup(jurisdiction_code)
        .ok_or_else(|| EncodeError::UnknownJurisdiction(jurisdiction_code.to_string()))?;
    encode_with(descriptor, records)
}

pub fn encode_with(
    descriptor: &JurisdictionDescriptor,
    records: &[SubmissionRecord],
) -> Result<Artifact, EncodeError> {
    if records.is_empty() {
        return Err(EncodeError::Empty);
    }
    if records.len() > descriptor.record_ceiling {
        return Err(EncodeError::TooManyRecords {
            jurisdiction: descriptor.code.to_string(),
            count: records.len(),
            ceiling: descriptor.record_ceiling,
        });
    }

    let groups: Vec<_> = records
        .iter()
        .map(|r| TargetGroup::indicated_by(&r.screening.categories))
        .collect();
    let pattern = descriptor.date_pattern;

    let content = match descriptor.layout {
        ArtifactLayout::Delimited { delimiter, columns } => {
            delimited::render(columns, sources(records, &groups), delimiter, pattern)
        }
        ArtifactLayout::FixedWidth { columns, .. } => {
            fixed_width::render(columns, sources(records, &groups), pattern)
        }
        ArtifactLayout::Xml {
            root,
            record,
            elements,
        } => markup::render(
            root,
            record,
            descriptor.code,
            elements,
            sources(records, &groups).collect(),
            pattern,
        ),
    };

    let format = descriptor.format();
    let file_name = format!(
        "wotc_{}_{}_{:016x}.{}",
        descriptor.code.to_ascii_lowercase(),
        records.len(),
        content_hash(&content),
        format.extension()
    );
    let rows = records
        .iter()
        .map(|r| ArtifactRow {
            record_id: r.record_id.clone(),
            signer: r.effective_signer().map(str::to_string),
        })
        .collect();

    Ok(Artifact {
        jurisdiction: descriptor.code.to_string(),
        format,
        file_name,
        content,
        rows,
    })
}

/// Issue label for the screening's category list as a whole
const TARGET_GROUPS_FIELD: &str = "target_groups";

/// One problem found before encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn issue(field: &'static str, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        field,
        message: message.into(),
    }
}

/// Inclusive age bounds on the employment start date
const AGE_BOUNDS: &[(TargetGroup, i32, i32)] = &[
    (TargetGroup::SummerYouth, 16, 17),
    (TargetGroup::DesignatedCommunityResident, 18, 39),
];

fn reference_date(screening: &Screening) -> Option<NaiveDate> {
    screening.started_date.or(screening.hired_date)
}

/// Check one employee/screening pair without encoding it
pub fn validate(
    jurisdiction_code: &str,
    employee: &Employee,
    screening: &Screening,
) -> Result<ValidationReport, EncodeError> {
    let descriptor = jurisdiction::lookup(jurisdiction_code)
        .ok_or_else(|| EncodeError::UnknownJurisdiction(jurisdiction_code.to_string()))?;
    Ok(ValidationReport::from_issues(person_issues(
        descriptor, employee, screening,
    )))
}

/// Employer-side required fields
pub fn validate_employer(
    jurisdiction_code: &str,
    employer: &Employer,
) -> Result<ValidationReport, EncodeError> {
    let descriptor = jurisdiction::lookup(jurisdiction_code)
        .ok_or_else(|| EncodeError::UnknownJurisdiction(jurisdiction_code.to_string()))?;
    Ok(ValidationReport::from_issues(employer_issues(
        descriptor, employer,
    )))
}

/// Full pre-encode check of a record (employee, screening and employer)
pub fn validate_record(
    descriptor: &JurisdictionDescriptor,
    record: &SubmissionRecord,
) -> ValidationReport {
    let mut errors = person_issues(descriptor, &record.employee, &record.screening);
    errors.extend(employer_issues(descriptor, &record.employer));
    ValidationReport::from_issues(errors)
}

fn person_issues(
    descriptor: &JurisdictionDescriptor,
    employee: &Employee,
    screening: &Screening,
) -> Vec<ValidationIssue> {
    let groups = TargetGroup::indicated_by(&screening.categories);
    let src = FieldSource {
        reference: "",
        employee,
        employer: None,
        screening,
        signer: None,
        groups: &groups,
    };

    let mut errors: Vec<ValidationIssue> = descriptor
        .required
        .iter()
        .filter(|f| !f.is_employer_field())
        .filter(|f| f.read(&src).is_none())
        .map(|f| issue(f.label(), "required"))
        .collect();

    let ssn = sanitize::digits_only(&employee.ssn);
    if !ssn.is_empty() && ssn.len() != 9 {
        errors.push(issue(Field::Ssn.label(), "must have 9 digits"));
    }
    let zip = sanitize::digits_only(&employee.address.zip);
    if !zip.is_empty() && zip.len() != 5 && zip.len() != 9 {
        errors.push(issue(Field::Zip.label(), "must have 5 or 9 digits"));
    }

    if groups.is_empty() {
        errors.push(issue(TARGET_GROUPS_FIELD, "no recognized target group"));
    }

    for (group, min, max) in AGE_BOUNDS {
        if !groups.contains(group) {
            continue;
        }
        let age = reference_date(screening).and_then(|on| employee.age_on(on));
        match age {
            Some(age) if (*min..=*max).contains(&age) => {}
            Some(age) => errors.push(issue(
                Field::DateOfBirth.label(),
                format!("age {age} outside {min}-{max} for {}", group.code()),
            )),
            None => errors.push(issue(
                Field::DateOfBirth.label(),
                format!("age cannot be established for {}", group.code()),
            )),
        }
    }

    if let (Some(hired), Some(started)) = (screening.hired_date, screening.started_date) {
        if started < hired {
            errors.push(issue(Field::StartedDate.label(), "before hired date"));
        }
    }

    errors
}

fn employer_issues(descriptor: &JurisdictionDescriptor, employer: &Employer) -> Vec<ValidationIssue> {
    let no_groups = BTreeSet::new();
    let blank_employee = Employee {
        id: String::new(),
        first_name: String::new(),
        middle_initial: None,
        last_name: String::new(),
        ssn: String::new(),
        date_of_birth: None,
        address: Default::default(),
        phone: None,
        email: None,
    };
    let blank_screening = Screening {
        id: String::new(),
        categories: Vec::new(),
        gave_information_date: None,
        offered_date: None,
        hired_date: None,
        started_date: None,
        starting_wage_cents: None,
        job_title: None,
        form_8850_signed_date: None,
        felony_conviction_date: None,
        felony_release_date: None,
        unemployment_start_date: None,
        benefits_recipient_name: None,
        benefits_recipient_city: None,
    };
    let src = FieldSource {
        reference: "",
        employee: &blank_employee,
        employer: Some(employer),
        screening: &blank_screening,
        signer: None,
        groups: &no_groups,
    };

    let mut errors: Vec<ValidationIssue> = descriptor
        .required
        .iter()
        .filter(|f| f.is_employer_field())
        .filter(|f| f.read(&src).is_none())
        .map(|f| issue(f.label(), "required"))
        .collect();

    let ein = sanitize::digits_only(&employer.ein);
    if !ein.is_empty() && ein.len() != 9 {
        errors.push(issue(Field::EmployerEin.label(), "must have 9 digits"));
    }
    errors
}


#[cfg(test)]
mod tests {
    use super::fixtures::{record, records};
    use super::*;
    use proptest::prelude::*;

    fn data_lines(content: &str) -> Vec<&str> {
        content.split("\r\n").filter(|l| !l.is_empty()).skip(1).collect()
    }

    #[test]
    fn test_az_header_and_rows() {
        let artifact = encode("AZ", &records(3)).unwrap();
        let lines: Vec<_> = artifact.content.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Reference ID,Employer Name"));
        assert_eq!(lines[1].split(',').count(), 50);
        assert_eq!(artifact.rows.len(), 3);
        assert_eq!(artifact.rows[0].record_id, "rec-001");
        assert_eq!(artifact.rows[0].signer.as_deref(), Some("Pat Lee"));
        assert!(artifact.file_name.starts_with("wotc_az_3_"));
        assert!(artifact.file_name.ends_with(".csv"));
    }

    #[test]
    fn test_az_quotes_identifiers_and_normalizes_dates() {
        let artifact = encode("AZ", &records(1)).unwrap();
        let line = data_lines(&artifact.content)[0];
        assert!(line.contains("\"123456789\""));
        assert!(line.contains("\"861234567\""));
        assert!(line.contains("\"04/02/1990\""));
        assert!(line.contains(",01/13/2025,"));
        assert!(line.contains(",15.50,"));
    }

    #[test]
    fn test_target_group_indicators() {
        let artifact = encode("TX", &records(1)).unwrap();
        let header: Vec<_> = artifact.content.lines().next().unwrap().split(',').collect();
        let row: Vec<_> = data_lines(&artifact.content)[0].split(',').collect();
        let snap = header.iter().position(|h| *h == "TG_SNAP").unwrap();
        let ssi = header.iter().position(|h| *h == "TG_SSI").unwrap();
        assert_eq!(row[snap], "Y");
        assert_eq!(row[ssi], "N");
    }

    #[test]
    fn test_ceiling_enforced_before_output() {
        let err = encode("TX", &records(251)).unwrap_err();
        assert_eq!(
            err,
            EncodeError::TooManyRecords {
                jurisdiction: "TX".into(),
                count: 251,
                ceiling: 250
            }
        );
        assert!(encode("TX", &records(250)).is_ok());
    }

    #[test]
    fn test_empty_and_unknown() {
        assert_eq!(encode("AZ", &[]).unwrap_err(), EncodeError::Empty);
        assert!(matches!(
            encode("ZZ", &records(1)),
            Err(EncodeError::UnknownJurisdiction(_))
        ));
    }

    #[test]
    fn test_fixed_width_records_are_400_chars_with_blank_gaps() {
        let artifact = encode("FL", &records(2)).unwrap();
        let lines: Vec<_> = artifact.content.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line.chars().count(), 400);
        }
        // COUNTY-CODE sits at 204..207, UNEMP-DURATION at 317..320
        assert_eq!(&lines[0][204..207], "   ");
        assert_eq!(&lines[0][317..320], "   ");
        assert_eq!(&lines[0][29..69].trim_end(), &"DESERT GRILL LLC");
        assert_eq!(&lines[0][124..132], "19900402");
        assert_eq!(&lines[0][249..256], "0001550");
    }

    #[test]
    fn test_xml_escapes_and_lists_groups() {
        let mut rec = record("rec-1");
        rec.employer.name = "Smith & Sons <West>".into();
        rec.screening.categories = vec!["SNAP".into(), "Ex-felon".into()];
        let artifact = encode("NY", &[rec]).unwrap();
        assert!(artifact.content.starts_with("<?xml"));
        assert!(artifact.content.contains("recordCount=\"1\""));
        assert!(artifact
            .content
            .contains("<EmployerName>Smith &amp; Sons &lt;West&gt;</EmployerName>"));
        assert!(artifact.content.contains("<DateOfBirth>1990-04-02</DateOfBirth>"));
        assert!(artifact.content.contains("<Group code=\"SNAP\"/>"));
        assert!(artifact.content.contains("<Group code=\"EXF\"/>"));
        assert_eq!(artifact.format, ArtifactFormat::Xml);
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let mut rec = record("r");
        rec.employee.date_of_birth = None;
        rec.screening.job_title = None;
        let report = validate("AZ", &rec.employee, &rec.screening).unwrap();
        assert!(!report.valid);
        let fields: Vec<_> = report.errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"date of birth"));
        assert!(fields.contains(&"job title"));

        // TX does not require a job title
        let report = validate("TX", &rec.employee, &rec.screening).unwrap();
        assert!(!report.errors.iter().any(|e| e.field == "job title"));
    }

    #[test]
    fn test_validate_youth_age_bounds() {
        let mut rec = record("r");
        rec.screening.categories = vec!["Summer Youth".into()];
        let report = validate("AZ", &rec.employee, &rec.screening).unwrap();
        assert!(!report.valid);
        assert!(report.summary().contains("outside 16-17"));

        rec.employee.date_of_birth = NaiveDate::from_ymd_opt(2008, 6, 1);
        let report = validate("AZ", &rec.employee, &rec.screening).unwrap();
        assert!(report.valid, "{}", report.summary());
    }

    #[test]
    fn test_validate_requires_target_group() {
        let mut rec = record("r");
        rec.screening.categories = vec!["Manager".into()];
        let report = validate("AZ", &rec.employee, &rec.screening).unwrap();
        assert!(!report.valid);
        let issue = report
            .errors
            .iter()
            .find(|e| e.message == "no recognized target group")
            .unwrap();
        assert_eq!(issue.field, "target_groups");
    }

    #[test]
    fn test_validate_employer() {
        let mut employer = record("r").employer;
        assert!(validate_employer("AZ", &employer).unwrap().valid);
        employer.ein = "12".into();
        employer.address.city = String::new();
        let report = validate_employer("AZ", &employer).unwrap();
        assert_eq!(report.errors.len(), 2);
        // NY does not require the employer city
        assert_eq!(validate_employer("NY", &employer).unwrap().errors.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_encode_is_deterministic(n in 1usize..20) {
            let recs = records(n);
            prop_assert_eq!(encode("AZ", &recs).unwrap(), encode("AZ", &recs).unwrap());
        }

        #[test]
        fn prop_free_text_never_breaks_alignment(
            name in "[ -~\\n\\r\\t]{0,40}",
            title in "[a-zA-Z,\"; ]{0,30}",
        ) {
            let mut rec = record("r");
            rec.employee.last_name = name;
            rec.screening.job_title = Some(title);
            let artifact = encode("AZ", &[rec]).unwrap();
            let lines = data_lines(&artifact.content);
            prop_assert_eq!(lines.len(), 1);
            prop_assert_eq!(lines[0].split(',').count(), 50);
            prop_assert_eq!(lines[0].matches('"').count() % 2, 0);
        }

        #[test]
        fn prop_fixed_width_length_is_constant(name in "\\PC{0,60}") {
            let mut rec = record("r");
            rec.employee.first_name = name;
            let artifact = encode("FL", &[rec]).unwrap();
            let line = artifact.content.trim_end_matches("\r\n");
            prop_assert_eq!(line.chars().count(), 400);
        }
    }
}
