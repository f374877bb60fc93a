// Artifact column layouts
//
// Each jurisdiction's portal expects a fixed column order. The tables below are the
// source of truth for both header rows and record rendering.

use chrono::NaiveDate;

use crate::domain::{Employee, Employer, Screening, TargetGroup};

/// A canonical data point an artifact column can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Column kept for layout compatibility but never populated
    Blank,
    ReferenceId,

    EmployerName,
    EmployerEin,
    EmployerAddress,
    EmployerCity,
    EmployerState,
    EmployerZip,
    EmployerPhone,
    EmployerContact,

    FirstName,
    MiddleInitial,
    LastName,
    Ssn,
    DateOfBirth,
    AddressLine1,
    AddressLine2,
    City,
    State,
    Zip,
    County,
    Phone,

    GaveInformationDate,
    OfferedDate,
    HiredDate,
    StartedDate,
    StartingWage,
    JobTitle,
    Form8850SignedDate,
    FelonyConvictionDate,
    FelonyReleaseDate,
    UnemploymentStartDate,
    BenefitsRecipientName,
    BenefitsRecipientCity,

    SignerName,
    SignerTitle,

    /// Y/N target-group indicator
    Group(TargetGroup),
}

/// Typed value of a field before format-specific rendering
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Digits(String),
    Date(NaiveDate),
    /// Hourly wage in cents
    Wage(i64),
    Flag(bool),
}

/// Everything a field can be read from
#[derive(Debug, Clone, Copy)]
pub struct FieldSource<'a> {
    pub reference: &'a str,
    pub employee: &'a Employee,
    pub employer: Option<&'a Employer>,
    pub screening: &'a Screening,
    pub signer: Option<&'a str>,
    pub groups: &'a std::collections::BTreeSet<TargetGroup>,
}

fn text(s: &str) -> Option<Value> {
    let s = s.trim();
    (!s.is_empty()).then(|| Value::Text(s.to_string()))
}

fn opt_text(s: Option<&String>) -> Option<Value> {
    s.and_then(|s| text(s))
}

fn digits(s: &str) -> Option<Value> {
    let d: String = s.chars().filter(char::is_ascii_digit).collect();
    (!d.is_empty()).then_some(Value::Digits(d))
}

impl Field {
    /// Human-readable name used in validation reports
    pub fn label(&self) -> &'static str {
        match self {
            Field::Blank => "blank",
            Field::ReferenceId => "reference id",
            Field::EmployerName => "employer name",
            Field::EmployerEin => "employer EIN",
            Field::EmployerAddress => "employer address",
            Field::EmployerCity => "employer city",
            Field::EmployerState => "employer state",
            Field::EmployerZip => "employer ZIP",
            Field::EmployerPhone => "employer phone",
            Field::EmployerContact => "employer contact",
            Field::FirstName => "first name",
            Field::MiddleInitial => "middle initial",
            Field::LastName => "last name",
            Field::Ssn => "SSN",
            Field::DateOfBirth => "date of birth",
            Field::AddressLine1 => "address",
            Field::AddressLine2 => "address line 2",
            Field::City => "city",
            Field::State => "state",
            Field::Zip => "ZIP",
            Field::County => "county",
            Field::Phone => "phone",
            Field::GaveInformationDate => "gave information date",
            Field::OfferedDate => "offered date",
            Field::HiredDate => "hired date",
            Field::StartedDate => "started date",
            Field::StartingWage => "starting wage",
            Field::JobTitle => "job title",
            Field::Form8850SignedDate => "form 8850 signed date",
            Field::FelonyConvictionDate => "felony conviction date",
            Field::FelonyReleaseDate => "felony release date",
            Field::UnemploymentStartDate => "unemployment start date",
            Field::BenefitsRecipientName => "benefits recipient name",
            Field::BenefitsRecipientCity => "benefits recipient city",
            Field::SignerName => "signer name",
            Field::SignerTitle => "signer title",
            Field::Group(_) => "target group",
        }
    }

    pub fn is_employer_field(&self) -> bool {
        matches!(
            self,
            Field::EmployerName
                | Field::EmployerEin
                | Field::EmployerAddress
                | Field::EmployerCity
                | Field::EmployerState
                | Field::EmployerZip
                | Field::EmployerPhone
                | Field::EmployerContact
                | Field::SignerTitle
        )
    }

    /// Read the field; `None` means absent (blank in the artifact)
    pub fn read(&self, src: &FieldSource<'_>) -> Option<Value> {
        let e = src.employee;
        let s = src.screening;
        match self {
            Field::Blank => None,
            Field::ReferenceId => text(src.reference),

            Field::EmployerName => src.employer.and_then(|r| text(&r.name)),
            Field::EmployerEin => src.employer.and_then(|r| digits(&r.ein)),
            Field::EmployerAddress => src.employer.and_then(|r| text(&r.address.line1)),
            Field::EmployerCity => src.employer.and_then(|r| text(&r.address.city)),
            Field::EmployerState => src.employer.and_then(|r| text(&r.address.state)),
            Field::EmployerZip => src.employer.and_then(|r| digits(&r.address.zip)),
            Field::EmployerPhone => src.employer.and_then(|r| r.phone.as_deref().and_then(digits)),
            Field::EmployerContact => src.employer.and_then(|r| opt_text(r.contact_name.as_ref())),

            Field::FirstName => text(&e.first_name),
            Field::MiddleInitial => opt_text(e.middle_initial.as_ref()),
            Field::LastName => text(&e.last_name),
            Field::Ssn => digits(&e.ssn),
            Field::DateOfBirth => e.date_of_birth.map(Value::Date),
            Field::AddressLine1 => text(&e.address.line1),
            Field::AddressLine2 => opt_text(e.address.line2.as_ref()),
            Field::City => text(&e.address.city),
            Field::State => text(&e.address.state),
            Field::Zip => digits(&e.address.zip),
            Field::County => opt_text(e.address.county.as_ref()),
            Field::Phone => e.phone.as_deref().and_then(digits),

            Field::GaveInformationDate => s.gave_information_date.map(Value::Date),
            Field::OfferedDate => s.offered_date.map(Value::Date),
            Field::HiredDate => s.hired_date.map(Value::Date),
            Field::StartedDate => s.started_date.map(Value::Date),
            Field::StartingWage => s.starting_wage_cents.map(Value::Wage),
            Field::JobTitle => opt_text(s.job_title.as_ref()),
            Field::Form8850SignedDate => s.form_8850_signed_date.map(Value::Date),
            Field::FelonyConvictionDate => s.felony_conviction_date.map(Value::Date),
            Field::FelonyReleaseDate => s.felony_release_date.map(Value::Date),
            Field::UnemploymentStartDate => s.unemployment_start_date.map(Value::Date),
            Field::BenefitsRecipientName => opt_text(s.benefits_recipient_name.as_ref()),
            Field::BenefitsRecipientCity => opt_text(s.benefits_recipient_city.as_ref()),

            Field::SignerName => src.signer.and_then(text),
            Field::SignerTitle => src.employer.and_then(|r| opt_text(r.signer_title.as_ref())),

            Field::Group(group) => Some(Value::Flag(src.groups.contains(group))),
        }
    }
}

/// One delimited or markup column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub header: &'static str,
    pub field: Field,
    /// Always wrapped in quotes so spreadsheet tooling keeps leading zeros
    pub quoted: bool,
}

const fn quoted(header: &'static str, field: Field) -> Column {
    Column {
        header,
        field,
        quoted: true,
    }
}

const fn plain(header: &'static str, field: Field) -> Column {
    Column {
        header,
        field,
        quoted: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    /// Numeric, zero padded
    Right,
}

/// One fixed-width column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedColumn {
    pub name: &'static str,
    pub field: Field,
    pub width: usize,
    pub align: Align,
}

const fn left(name: &'static str, field: Field, width: usize) -> FixedColumn {
    FixedColumn {
        name,
        field,
        width,
        align: Align::Left,
    }
}

const fn right(name: &'static str, field: Field, width: usize) -> FixedColumn {
    FixedColumn {
        name,
        field,
        width,
        align: Align::Right,
    }
}

use TargetGroup as G;

pub const AZ_COLUMNS: &[Column] = &[
    quoted("Reference ID", Field::ReferenceId),
    quoted("Employer Name", Field::EmployerName),
    quoted("Employer FEIN", Field::EmployerEin),
    quoted("Employer Address", Field::EmployerAddress),
    quoted("Employer City", Field::EmployerCity),
    quoted("Employer State", Field::EmployerState),
    quoted("Employer ZIP", Field::EmployerZip),
    quoted("Employer Phone", Field::EmployerPhone),
    quoted("Employer Contact", Field::EmployerContact),
    quoted("First Name", Field::FirstName),
    quoted("Middle Initial", Field::MiddleInitial),
    quoted("Last Name", Field::LastName),
    quoted("SSN", Field::Ssn),
    quoted("Date of Birth", Field::DateOfBirth),
    quoted("Address Line 1", Field::AddressLine1),
    quoted("Address Line 2", Field::AddressLine2),
    quoted("City", Field::City),
    quoted("State", Field::State),
    quoted("ZIP", Field::Zip),
    quoted("County", Field::County),
    quoted("Phone", Field::Phone),
    plain("Gave Information Date", Field::GaveInformationDate),
    plain("Offered Date", Field::OfferedDate),
    plain("Hired Date", Field::HiredDate),
    plain("Started Date", Field::StartedDate),
    plain("Starting Wage", Field::StartingWage),
    quoted("Job Title", Field::JobTitle),
    plain("8850 Signed Date", Field::Form8850SignedDate),
    plain("IV-A Recipient", Field::Group(G::TanfShortTerm)),
    plain("Long-Term TANF", Field::Group(G::TanfLongTerm)),
    plain("Veteran", Field::Group(G::Veteran)),
    plain("Veteran SNAP", Field::Group(G::VeteranSnap)),
    plain("Disabled Veteran Discharged", Field::Group(G::VeteranDisabledDischarged)),
    plain("Disabled Veteran Unemployed", Field::Group(G::VeteranDisabledUnemployed)),
    plain("Veteran Unemployed 4 Weeks", Field::Group(G::VeteranUnemployedShort)),
    plain("Veteran Unemployed 6 Months", Field::Group(G::VeteranUnemployedLong)),
    plain("Ex-Felon", Field::Group(G::ExFelon)),
    plain("Conviction Date", Field::FelonyConvictionDate),
    plain("Release Date", Field::FelonyReleaseDate),
    plain("Designated Community Resident", Field::Group(G::DesignatedCommunityResident)),
    plain("Vocational Rehabilitation", Field::Group(G::VocationalRehabilitation)),
    plain("Summer Youth", Field::Group(G::SummerYouth)),
    plain("SNAP Recipient", Field::Group(G::Snap)),
    plain("SSI Recipient", Field::Group(G::Ssi)),
    plain("Long-Term Unemployed", Field::Group(G::LongTermUnemployed)),
    plain("Unemployment Start Date", Field::UnemploymentStartDate),
    quoted("Benefits Recipient Name", Field::BenefitsRecipientName),
    quoted("Benefits Recipient City", Field::BenefitsRecipientCity),
    quoted("Signer Name", Field::SignerName),
    quoted("Signer Title", Field::SignerTitle),
];

pub const TX_COLUMNS: &[Column] = &[
    quoted("REF_ID", Field::ReferenceId),
    quoted("SSN", Field::Ssn),
    quoted("LAST_NAME", Field::LastName),
    quoted("FIRST_NAME", Field::FirstName),
    quoted("MI", Field::MiddleInitial),
    quoted("DOB", Field::DateOfBirth),
    quoted("STREET", Field::AddressLine1),
    quoted("CITY", Field::City),
    quoted("STATE", Field::State),
    quoted("ZIP", Field::Zip),
    quoted("PHONE", Field::Phone),
    quoted("EMPLOYER_FEIN", Field::EmployerEin),
    quoted("EMPLOYER_NAME", Field::EmployerName),
    quoted("EMPLOYER_STREET", Field::EmployerAddress),
    quoted("EMPLOYER_CITY", Field::EmployerCity),
    quoted("EMPLOYER_STATE", Field::EmployerState),
    quoted("EMPLOYER_ZIP", Field::EmployerZip),
    quoted("EMPLOYER_PHONE", Field::EmployerPhone),
    plain("GAVE_INFO_DATE", Field::GaveInformationDate),
    plain("OFFER_DATE", Field::OfferedDate),
    plain("HIRE_DATE", Field::HiredDate),
    plain("START_DATE", Field::StartedDate),
    plain("START_WAGE", Field::StartingWage),
    quoted("POSITION", Field::JobTitle),
    plain("FORM_8850_DATE", Field::Form8850SignedDate),
    plain("TG_IVA", Field::Group(G::TanfShortTerm)),
    plain("TG_LTFA", Field::Group(G::TanfLongTerm)),
    plain("TG_VET", Field::Group(G::Veteran)),
    plain("TG_VET_SNAP", Field::Group(G::VeteranSnap)),
    plain("TG_VET_DIS_DSCH", Field::Group(G::VeteranDisabledDischarged)),
    plain("TG_VET_DIS_UNEMP", Field::Group(G::VeteranDisabledUnemployed)),
    plain("TG_VET_UNEMP_4W", Field::Group(G::VeteranUnemployedShort)),
    plain("TG_VET_UNEMP_6M", Field::Group(G::VeteranUnemployedLong)),
    plain("TG_EXFELON", Field::Group(G::ExFelon)),
    plain("CONVICTION_DATE", Field::FelonyConvictionDate),
    plain("RELEASE_DATE", Field::FelonyReleaseDate),
    plain("TG_DCR", Field::Group(G::DesignatedCommunityResident)),
    plain("TG_VR", Field::Group(G::VocationalRehabilitation)),
    plain("TG_SUMMER_YOUTH", Field::Group(G::SummerYouth)),
    plain("TG_SNAP", Field::Group(G::Snap)),
    plain("TG_SSI", Field::Group(G::Ssi)),
    plain("TG_LTU", Field::Group(G::LongTermUnemployed)),
    plain("UNEMP_START_DATE", Field::UnemploymentStartDate),
    quoted("BENEFITS_NAME", Field::BenefitsRecipientName),
    quoted("BENEFITS_CITY", Field::BenefitsRecipientCity),
    quoted("SIGNER", Field::SignerName),
];

/// Element order inside each `<Applicant>`; target groups follow as `<TargetGroups>`
pub const NY_ELEMENTS: &[Column] = &[
    plain("FirstName", Field::FirstName),
    plain("MiddleInitial", Field::MiddleInitial),
    plain("LastName", Field::LastName),
    plain("SSN", Field::Ssn),
    plain("DateOfBirth", Field::DateOfBirth),
    plain("Street", Field::AddressLine1),
    plain("Street2", Field::AddressLine2),
    plain("City", Field::City),
    plain("State", Field::State),
    plain("Zip", Field::Zip),
    plain("County", Field::County),
    plain("Phone", Field::Phone),
    plain("EmployerName", Field::EmployerName),
    plain("EmployerFEIN", Field::EmployerEin),
    plain("EmployerStreet", Field::EmployerAddress),
    plain("EmployerCity", Field::EmployerCity),
    plain("EmployerState", Field::EmployerState),
    plain("EmployerZip", Field::EmployerZip),
    plain("GaveInformationDate", Field::GaveInformationDate),
    plain("OfferDate", Field::OfferedDate),
    plain("HireDate", Field::HiredDate),
    plain("StartDate", Field::StartedDate),
    plain("StartingWage", Field::StartingWage),
    plain("Position", Field::JobTitle),
    plain("Form8850Date", Field::Form8850SignedDate),
    plain("ConvictionDate", Field::FelonyConvictionDate),
    plain("ReleaseDate", Field::FelonyReleaseDate),
    plain("UnemploymentStartDate", Field::UnemploymentStartDate),
    plain("BenefitsRecipientName", Field::BenefitsRecipientName),
    plain("BenefitsRecipientCity", Field::BenefitsRecipientCity),
    plain("Signer", Field::SignerName),
    plain("SignerTitle", Field::SignerTitle),
];

pub const FL_RECORD_LEN: usize = 400;

pub const FL_COLUMNS: &[FixedColumn] = &[
    left("REFERENCE", Field::ReferenceId, 20),
    right("FEIN", Field::EmployerEin, 9),
    left("EMPLOYER-NAME", Field::EmployerName, 40),
    right("SSN", Field::Ssn, 9),
    left("LAST-NAME", Field::LastName, 25),
    left("FIRST-NAME", Field::FirstName, 20),
    left("MI", Field::MiddleInitial, 1),
    left("DOB", Field::DateOfBirth, 8),
    left("STREET", Field::AddressLine1, 40),
    left("CITY", Field::City, 25),
    left("STATE", Field::State, 2),
    right("ZIP", Field::Zip, 5),
    // County code table was never published for the batch format
    left("COUNTY-CODE", Field::Blank, 3),
    right("PHONE", Field::Phone, 10),
    left("GAVE-INFO-DATE", Field::GaveInformationDate, 8),
    left("OFFER-DATE", Field::OfferedDate, 8),
    left("HIRE-DATE", Field::HiredDate, 8),
    left("START-DATE", Field::StartedDate, 8),
    right("WAGE-CENTS", Field::StartingWage, 7),
    left("POSITION", Field::JobTitle, 30),
    left("TG-IVA", Field::Group(G::TanfShortTerm), 1),
    left("TG-LTFA", Field::Group(G::TanfLongTerm), 1),
    left("TG-VET", Field::Group(G::Veteran), 1),
    left("TG-VET-SNAP", Field::Group(G::VeteranSnap), 1),
    left("TG-VET-DIS-DSCH", Field::Group(G::VeteranDisabledDischarged), 1),
    left("TG-VET-DIS-UNEMP", Field::Group(G::VeteranDisabledUnemployed), 1),
    left("TG-VET-UNEMP-4W", Field::Group(G::VeteranUnemployedShort), 1),
    left("TG-VET-UNEMP-6M", Field::Group(G::VeteranUnemployedLong), 1),
    left("TG-EXF", Field::Group(G::ExFelon), 1),
    left("TG-DCR", Field::Group(G::DesignatedCommunityResident), 1),
    left("TG-VR", Field::Group(G::VocationalRehabilitation), 1),
    left("TG-SY", Field::Group(G::SummerYouth), 1),
    left("TG-SNAP", Field::Group(G::Snap), 1),
    left("TG-SSI", Field::Group(G::Ssi), 1),
    left("TG-LTU", Field::Group(G::LongTermUnemployed), 1),
    left("CONVICTION-DATE", Field::FelonyConvictionDate, 8),
    left("RELEASE-DATE", Field::FelonyReleaseDate, 8),
    // Portal computes duration itself and rejects anything but spaces here
    left("UNEMP-DURATION", Field::Blank, 3),
    left("SIGNER", Field::SignerName, 40),
    left("8850-DATE", Field::Form8850SignedDate, 8),
    left("FILLER", Field::Blank, 32),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_counts() {
        assert_eq!(AZ_COLUMNS.len(), 50);
        assert_eq!(TX_COLUMNS.len(), 46);
    }

    #[test]
    fn test_fixed_width_sums_to_record_len() {
        let total: usize = FL_COLUMNS.iter().map(|c| c.width).sum();
        assert_eq!(total, FL_RECORD_LEN);
    }

    #[test]
    fn test_every_target_group_has_a_column() {
        for group in TargetGroup::ALL {
            let field = Field::Group(group);
            assert!(AZ_COLUMNS.iter().any(|c| c.field == field), "AZ {group:?}");
            assert!(TX_COLUMNS.iter().any(|c| c.field == field), "TX {group:?}");
            assert!(FL_COLUMNS.iter().any(|c| c.field == field), "FL {group:?}");
        }
    }

    #[test]
    fn test_headers_unique() {
        let mut seen = std::collections::HashSet::new();
        for col in AZ_COLUMNS {
            assert!(seen.insert(col.header), "duplicate header {}", col.header);
        }
    }
}
