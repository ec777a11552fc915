use serde::{Deserialize, Serialize};

/// One filter's verdict on one email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub filter_name: String,
    pub passed: bool,
    pub reasons: Vec<String>,
}

impl FilterDecision {
    pub fn new(filter_name: &str, passed: bool, reasons: Vec<String>) -> Self {
        Self {
            filter_name: filter_name.to_string(),
            passed,
            reasons,
        }
    }

    pub fn pass(filter_name: &str, reasons: Vec<String>) -> Self {
        Self::new(filter_name, true, reasons)
    }

    pub fn fail(filter_name: &str, reasons: Vec<String>) -> Self {
        Self::new(filter_name, false, reasons)
    }

    /// Score this filter reported in a `score: <v> (threshold: <t>)` reason
    pub fn score(&self) -> Option<f64> {
        self.reasons.iter().rev().find_map(|reason| parse_score(reason))
    }
}

/// The pipeline's aggregate verdict for one email.
///
/// `decisions` holds only the filters that actually ran, so under
/// short-circuiting it can be shorter than the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub passed: bool,
    pub reasons: Vec<String>,
    pub decisions: Vec<FilterDecision>,
}

pub(crate) const SCORE_PREFIX: &str = "score: ";

impl FilterOutcome {
    /// Keyword score recorded in the trailing `score: <v> (threshold: <t>)`
    /// reason, if any filter reported one
    pub fn score(&self) -> Option<f64> {
        self.reasons.iter().rev().find_map(|reason| parse_score(reason))
    }

    pub fn decision(&self, filter_name: &str) -> Option<&FilterDecision> {
        self.decisions.iter().find(|d| d.filter_name == filter_name)
    }
}

fn parse_score(reason: &str) -> Option<f64> {
    let rest = reason.strip_prefix(SCORE_PREFIX)?;
    let value = rest.split_whitespace().next()?;
    value.parse().ok()
}
