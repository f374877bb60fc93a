// WOTC target groups
//
// Upstream category names drift ("SNAP", "Food Stamps", "snap recipient (veteran)"), so
// matching is keyword based over normalized text rather than an exact enum match.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetGroup {
    /// IV-A recipient (TANF, short term)
    TanfShortTerm,
    /// Long-term family assistance recipient
    TanfLongTerm,
    /// Any qualified veteran; set alongside every veteran subgroup
    Veteran,
    VeteranSnap,
    VeteranDisabledDischarged,
    VeteranDisabledUnemployed,
    VeteranUnemployedShort,
    VeteranUnemployedLong,
    ExFelon,
    DesignatedCommunityResident,
    VocationalRehabilitation,
    SummerYouth,
    Snap,
    Ssi,
    LongTermUnemployed,
}

struct Rule {
    group: TargetGroup,
    /// Any one of these groups must fully match (all keywords present)
    any_of: &'static [&'static [&'static str]],
    none_of: &'static [&'static str],
}

// Order matters only for readability; every rule is evaluated.
const RULES: &[Rule] = &[
    Rule {
        group: TargetGroup::TanfLongTerm,
        any_of: &[&["long", "term", "family", "assistance"], &["ltfa"], &["long", "term", "tanf"]],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::TanfShortTerm,
        any_of: &[&["tanf"], &["iv", "a"], &["iva"], &["family", "assistance"]],
        none_of: &["long"],
    },
    Rule {
        group: TargetGroup::VeteranSnap,
        any_of: &[&["veteran", "snap"], &["veteran", "food", "stamp"]],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::VeteranDisabledDischarged,
        any_of: &[&["veteran", "disab", "discharg"], &["veteran", "disab", "1", "year"]],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::VeteranDisabledUnemployed,
        any_of: &[&["veteran", "disab", "unemploy"]],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::VeteranUnemployedShort,
        any_of: &[&["veteran", "unemploy", "4", "week"], &["veteran", "unemploy", "four"]],
        none_of: &["disab"],
    },
    Rule {
        group: TargetGroup::VeteranUnemployedLong,
        any_of: &[&["veteran", "unemploy", "6", "month"], &["veteran", "unemploy", "six"]],
        none_of: &["disab"],
    },
    Rule {
        group: TargetGroup::ExFelon,
        any_of: &[&["felon"], &["convict"]],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::DesignatedCommunityResident,
        any_of: &[
            &["designated", "community"],
            &["empowerment", "zone"],
            &["rural", "renewal"],
            &["dcr"],
        ],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::VocationalRehabilitation,
        any_of: &[&["vocational"], &["rehab"], &["ticket", "to", "work"]],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::SummerYouth,
        any_of: &[&["summer", "youth"]],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::Snap,
        any_of: &[&["snap"], &["food", "stamp"], &["supplemental", "nutrition"]],
        none_of: &["veteran"],
    },
    Rule {
        group: TargetGroup::Ssi,
        any_of: &[&["ssi"], &["supplemental", "security"]],
        none_of: &[],
    },
    Rule {
        group: TargetGroup::LongTermUnemployed,
        any_of: &[&["long", "term", "unemploy"], &["27", "week"], &["ltu"]],
        none_of: &["veteran"],
    },
];

/// Lowercase, split on anything that is not alphanumeric
fn tokens(category: &str) -> Vec<String> {
    category
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// A keyword matches a token when the token starts with it ("disab" ~ "disabled").
/// Single letters and digits only match whole tokens.
fn has_keyword(tokens: &[String], keyword: &str) -> bool {
    tokens.iter().any(|t| {
        if keyword.len() <= 2 || keyword.chars().all(|c| c.is_ascii_digit()) {
            t == keyword
        } else {
            t.starts_with(keyword)
        }
    })
}

impl TargetGroup {
    pub const ALL: [TargetGroup; 15] = [
        TargetGroup::TanfShortTerm,
        TargetGroup::TanfLongTerm,
        TargetGroup::Veteran,
        TargetGroup::VeteranSnap,
        TargetGroup::VeteranDisabledDischarged,
        TargetGroup::VeteranDisabledUnemployed,
        TargetGroup::VeteranUnemployedShort,
        TargetGroup::VeteranUnemployedLong,
        TargetGroup::ExFelon,
        TargetGroup::DesignatedCommunityResident,
        TargetGroup::VocationalRehabilitation,
        TargetGroup::SummerYouth,
        TargetGroup::Snap,
        TargetGroup::Ssi,
        TargetGroup::LongTermUnemployed,
    ];

    /// Short code used in XML artifacts
    pub fn code(&self) -> &'static str {
        match self {
            TargetGroup::TanfShortTerm => "IVA",
            TargetGroup::TanfLongTerm => "LTFA",
            TargetGroup::Veteran => "VET",
            TargetGroup::VeteranSnap => "VET-SNAP",
            TargetGroup::VeteranDisabledDischarged => "VET-DIS-DSCH",
            TargetGroup::VeteranDisabledUnemployed => "VET-DIS-UNEMP",
            TargetGroup::VeteranUnemployedShort => "VET-UNEMP-4W",
            TargetGroup::VeteranUnemployedLong => "VET-UNEMP-6M",
            TargetGroup::ExFelon => "EXF",
            TargetGroup::DesignatedCommunityResident => "DCR",
            TargetGroup::VocationalRehabilitation => "VR",
            TargetGroup::SummerYouth => "SY",
            TargetGroup::Snap => "SNAP",
            TargetGroup::Ssi => "SSI",
            TargetGroup::LongTermUnemployed => "LTU",
        }
    }

    pub fn is_veteran(&self) -> bool {
        matches!(
            self,
            TargetGroup::Veteran
                | TargetGroup::VeteranSnap
                | TargetGroup::VeteranDisabledDischarged
                | TargetGroup::VeteranDisabledUnemployed
                | TargetGroup::VeteranUnemployedShort
                | TargetGroup::VeteranUnemployedLong
        )
    }

    /// Target groups indicated by one free-text category
    pub fn from_category(category: &str) -> BTreeSet<TargetGroup> {
        let tokens = tokens(category);
        let mut groups: BTreeSet<TargetGroup> = RULES
            .iter()
            .filter(|rule| {
                rule.any_of
                    .iter()
                    .any(|all| all.iter().all(|k| has_keyword(&tokens, k)))
                    && !rule.none_of.iter().any(|k| has_keyword(&tokens, k))
            })
            .map(|rule| rule.group)
            .collect();

        if has_keyword(&tokens, "veteran") || groups.iter().any(TargetGroup::is_veteran) {
            groups.insert(TargetGroup::Veteran);
        }
        groups
    }

    /// Union over a screening's category list
    pub fn indicated_by<S: AsRef<str>>(categories: &[S]) -> BTreeSet<TargetGroup> {
        categories
            .iter()
            .flat_map(|c| TargetGroup::from_category(c.as_ref()))
            .collect()
    }
}
