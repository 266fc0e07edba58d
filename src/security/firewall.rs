//! Per-project rule evaluation.
//!
//! # Responsibilities
//! - Walk a project's rules in stored order
//! - Skip disabled rules
//! - Stop at the first enabled rule that matches
//!
//! # Design Decisions
//! - Pure function over borrowed data; no I/O, no logging. The pipeline
//!   reports the decision.
//! - Address rules compare the client address textually, exactly.
//! - Keyword rules match anywhere in the raw target (path + query), verbatim.

use crate::config::UnknownRulePolicy;
use crate::store::{Rule, RuleKind};

/// The parts of a request rules can inspect.
#[derive(Debug, Clone, Copy)]
pub struct Inspection<'a> {
    /// Client IP address without port.
    pub client_addr: &'a str,
    /// Request target as received: path plus `?query`.
    pub target: &'a str,
}

/// Outcome of evaluating a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<'a> {
    /// No enabled rule matched.
    Allow,
    /// The first matching rule.
    Block(&'a Rule),
    /// An unrecognised rule kind under [`UnknownRulePolicy::Reject`].
    Misconfigured(&'a Rule),
}

/// A verdict plus the unrecognised rules that were passed over on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<'a> {
    pub verdict: Verdict<'a>,
    pub skipped: Vec<&'a Rule>,
}

/// Whether `rule` matches. `None` for kinds this build does not understand.
pub fn rule_matches(rule: &Rule, request: &Inspection<'_>) -> Option<bool> {
    match &rule.kind {
        RuleKind::AddressBlock => Some(request.client_addr == rule.value),
        RuleKind::KeywordBlock => Some(request.target.contains(rule.value.as_str())),
        RuleKind::Other(_) => None,
    }
}

/// Evaluate `rules` in order against `request`.
pub fn evaluate<'a>(
    rules: &'a [Rule],
    request: &Inspection<'_>,
    unknown: UnknownRulePolicy,
) -> Decision<'a> {
    let mut skipped = Vec::new();

    for rule in rules.iter().filter(|r| r.enabled) {
        match rule_matches(rule, request) {
            Some(true) => {
                return Decision {
                    verdict: Verdict::Block(rule),
                    skipped,
                }
            }
            Some(false) => {}
            None => match unknown {
                UnknownRulePolicy::Skip => skipped.push(rule),
                UnknownRulePolicy::Reject => {
                    return Decision {
                        verdict: Verdict::Misconfigured(rule),
                        skipped,
                    }
                }
            },
        }
    }

    Decision {
        verdict: Verdict::Allow,
        skipped,
    }
}
