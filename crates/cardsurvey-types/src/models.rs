use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Maximum number of options a survey card may offer.
pub const MAX_OPTIONS: usize = 5;

/// Minimum number of options for a card to be a choice at all.
pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Draft,
    Active,
    Closed,
}

impl SurveyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Lifecycle only moves forward: Draft -> Active -> Closed.
    pub fn can_transition_to(self, next: SurveyStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Active) | (Self::Active, Self::Closed)
        )
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Private,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyType {
    #[default]
    Card,
}

impl SurveyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card" => Some(Self::Card),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<String>,
}

/// A respondent's answer to a card: either skipped, or one option value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum AnswerState {
    Skipped,
    Answered(String),
}

impl AnswerState {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Skipped => None,
            Self::Answered(v) => Some(v),
        }
    }
}

/// Per-option response counters, kept in the survey's option order.
///
/// Serialized as a JSON object whose keys follow option order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionCounts(Vec<(String, i64)>);

impl OptionCounts {
    /// One zero counter per option.
    pub fn zeroed(options: &[String]) -> Self {
        Self(options.iter().map(|o| (o.clone(), 0)).collect())
    }

    pub fn from_pairs(pairs: Vec<(String, i64)>) -> Self {
        Self(pairs)
    }

    /// Adds `delta` to the counter for `option`. Returns false when the
    /// option is not defined, leaving the counters untouched.
    pub fn add(&mut self, option: &str, delta: i64) -> bool {
        match self.0.iter_mut().find(|(o, _)| o == option) {
            Some((_, count)) => {
                *count += delta;
                true
            }
            None => false,
        }
    }

    pub fn total(&self) -> i64 {
        self.0.iter().map(|(_, c)| c).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(o, c)| (o.as_str(), *c))
    }
}

impl Serialize for OptionCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (option, count) in &self.0 {
            map.serialize_entry(option, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OptionCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountsVisitor;

        impl<'de> Visitor<'de> for CountsVisitor {
            type Value = OptionCounts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of option to count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<OptionCounts, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((option, count)) = access.next_entry::<String, i64>()? {
                    pairs.push((option, count));
                }
                Ok(OptionCounts(pairs))
            }
        }

        deserializer.deserialize_map(CountsVisitor)
    }
}

/// A survey document, counters included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub survey_type: SurveyType,
    pub questions: Vec<Question>,
    pub question_count: u32,
    pub responses: i64,
    pub skip_count: i64,
    pub option_counts: OptionCounts,
    pub status: SurveyStatus,
    pub privacy: Privacy,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Survey {
    /// The card's single question.
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }
}

/// Aggregate view returned to a survey's creator and after each answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyStats {
    pub survey_id: Uuid,
    pub title: String,
    pub question: String,
    pub status: SurveyStatus,
    pub responses: i64,
    pub skip_count: i64,
    pub option_counts: OptionCounts,
}

impl From<&Survey> for SurveyStats {
    fn from(survey: &Survey) -> Self {
        Self {
            survey_id: survey.id,
            title: survey.title.clone(),
            question: survey.question().map(|q| q.text.clone()).unwrap_or_default(),
            status: survey.status,
            responses: survey.responses,
            skip_count: survey.skip_count,
            option_counts: survey.option_counts.clone(),
        }
    }
}

/// The one stored answer per (user, survey).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSurveyAnswer {
    pub user_id: Uuid,
    pub survey_id: Uuid,
    pub question_id: Uuid,
    pub answer: AnswerState,
    pub answered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_state_wire_shape() {
        let skipped = serde_json::to_value(AnswerState::Skipped).unwrap();
        assert_eq!(skipped, serde_json::json!({ "state": "skipped" }));

        let answered = serde_json::to_value(AnswerState::Answered("Yes".into())).unwrap();
        assert_eq!(answered, serde_json::json!({ "state": "answered", "value": "Yes" }));

        let parsed: AnswerState = serde_json::from_str(r#"{"state":"skipped"}"#).unwrap();
        assert_eq!(parsed, AnswerState::Skipped);
    }

    #[test]
    fn option_counts_keep_option_order() {
        let options = vec!["Yes".to_string(), "No".to_string(), "Maybe".to_string()];
        let mut counts = OptionCounts::zeroed(&options);
        assert!(counts.add("Maybe", 2));
        assert!(!counts.add("Unknown", 1));

        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"Yes":0,"No":0,"Maybe":2}"#);

        let back: OptionCounts = serde_json::from_str(r#"{"Zeta":1,"Alpha":3}"#).unwrap();
        let keys: Vec<&str> = back.iter().map(|(o, _)| o).collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
        assert_eq!(back.total(), 4);
    }

    #[test]
    fn status_lifecycle_only_moves_forward() {
        assert!(SurveyStatus::Draft.can_transition_to(SurveyStatus::Active));
        assert!(SurveyStatus::Active.can_transition_to(SurveyStatus::Closed));
        assert!(!SurveyStatus::Active.can_transition_to(SurveyStatus::Draft));
        assert!(!SurveyStatus::Draft.can_transition_to(SurveyStatus::Closed));
        assert!(!SurveyStatus::Closed.can_transition_to(SurveyStatus::Active));
    }
}
