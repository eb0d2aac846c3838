use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cardsurvey_types::models::AnswerState;

/// What to do with an answer whose value is not one of the card's options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownOptionPolicy {
    /// Refuse the answer; nothing is recorded.
    #[default]
    Reject,
    /// Count the response but tally no option.
    Drop,
}

impl FromStr for UnknownOptionPolicy {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "drop" => Ok(Self::Drop),
            other => Err(ReconcileError::UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("answer '{0}' is not one of the survey's options")]
    UnknownOption(String),

    #[error("unknown option policy '{0}' (expected 'reject' or 'drop')")]
    UnknownPolicy(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDelta {
    pub option: String,
    pub delta: i64,
}

/// Counter changes that move an aggregate from a respondent's previous
/// state to their current one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsDelta {
    pub responses: i64,
    pub skips: i64,
    /// At most two entries: the old option going down, the new one going up.
    pub options: Vec<OptionDelta>,
}

impl StatsDelta {
    pub fn is_empty(&self) -> bool {
        self.responses == 0 && self.skips == 0 && self.options.is_empty()
    }
}

/// Computes the counter deltas for one respondent moving from `previous`
/// (`None` on first interaction) to `current`.
///
/// Only values present in `options` ever touch an option counter. A stale
/// previous value that is no longer an option is not decremented.
pub fn compute_delta(
    previous: Option<&AnswerState>,
    current: &AnswerState,
    options: &[String],
    policy: UnknownOptionPolicy,
) -> Result<StatsDelta, ReconcileError> {
    let is_option = |v: &str| options.iter().any(|o| o == v);

    if let AnswerState::Answered(value) = current {
        if !is_option(value) && policy == UnknownOptionPolicy::Reject {
            return Err(ReconcileError::UnknownOption(value.clone()));
        }
    }

    if previous == Some(current) {
        return Ok(StatsDelta::default());
    }

    let was_response = matches!(previous, Some(AnswerState::Answered(_)));
    let was_skip = matches!(previous, Some(AnswerState::Skipped));

    let mut delta = StatsDelta {
        responses: i64::from(!current.is_skipped()) - i64::from(was_response),
        skips: i64::from(current.is_skipped()) - i64::from(was_skip),
        options: Vec::new(),
    };

    if let Some(AnswerState::Answered(old)) = previous {
        if is_option(old) {
            delta.options.push(OptionDelta { option: old.clone(), delta: -1 });
        }
    }

    if let AnswerState::Answered(new) = current {
        if is_option(new) {
            delta.options.push(OptionDelta { option: new.clone(), delta: 1 });
        }
    }

    Ok(delta)
}
