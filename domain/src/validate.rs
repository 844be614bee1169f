//! Username rules. Each rule is tagged with the failure it reports, and the
//! validator walks them in order, stopping at the first one that fails.

use std::borrow::Cow;

use serde::Serialize;

/// Why a username was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    TooShort,
    TooLong,
    RepeatedPeriod,
    TrailingPeriod,
    AlreadyTaken,
}

impl RuleKind {
    /// Message shown verbatim to the person filling in the form. The length
    /// messages quote the bounds of `policy`.
    pub fn message(&self, policy: &UsernamePolicy) -> Cow<'static, str> {
        match self {
            RuleKind::TooShort => format!(
                "Username must be at least {} characters.",
                policy.min_length
            )
            .into(),
            RuleKind::TooLong => {
                format!("Username must be at most {} characters.", policy.max_length).into()
            }
            RuleKind::RepeatedPeriod => "Username cannot have multiple periods in a row.".into(),
            RuleKind::TrailingPeriod => "Username cannot end in a period.".into(),
            RuleKind::AlreadyTaken => "Username is already taken.".into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RuleKind::TooShort => "too_short",
            RuleKind::TooLong => "too_long",
            RuleKind::RepeatedPeriod => "repeated_period",
            RuleKind::TrailingPeriod => "trailing_period",
            RuleKind::AlreadyTaken => "already_taken",
        }
    }
}

/// Length bounds for usernames, counted in characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsernamePolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for UsernamePolicy {
    fn default() -> Self {
        Self {
            min_length: 2,
            max_length: 30,
        }
    }
}

pub fn no_multiple_periods(value: &str) -> bool {
    !value.contains("..")
}

pub fn not_ending_in_period(value: &str) -> bool {
    !value.ends_with('.')
}

/// How a rule decides.
#[derive(Clone, Copy)]
pub enum Check {
    /// Pure predicate over the candidate and the active policy.
    Local(fn(&str, &UsernamePolicy) -> bool),
    /// Ask the availability oracle (through the cache).
    Available,
}

/// A named rule and the failure it reports.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub kind: RuleKind,
    pub check: Check,
}

/// Rules in evaluation order. The remote check comes last so that cheap
/// structural failures never cost a lookup.
pub const DEFAULT_RULES: [Rule; 5] = [
    Rule {
        name: "min_length",
        kind: RuleKind::TooShort,
        check: Check::Local(|v, p| v.chars().count() >= p.min_length),
    },
    Rule {
        name: "max_length",
        kind: RuleKind::TooLong,
        check: Check::Local(|v, p| v.chars().count() <= p.max_length),
    },
    Rule {
        name: "no_multiple_periods",
        kind: RuleKind::RepeatedPeriod,
        check: Check::Local(|v, _| no_multiple_periods(v)),
    },
    Rule {
        name: "not_ending_in_period",
        kind: RuleKind::TrailingPeriod,
        check: Check::Local(|v, _| not_ending_in_period(v)),
    },
    Rule {
        name: "available",
        kind: RuleKind::AlreadyTaken,
        check: Check::Available,
    },
];

/// Run only the local rules, returning the first failure.
pub fn check_structure(candidate: &str, policy: &UsernamePolicy) -> Result<(), RuleKind> {
    for rule in DEFAULT_RULES.iter() {
        if let Check::Local(pred) = rule.check {
            if !pred(candidate, policy) {
                return Err(rule.kind);
            }
        }
    }
    Ok(())
}
