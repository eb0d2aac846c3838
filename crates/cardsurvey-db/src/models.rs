//! Database row types: these map directly to SQLite rows.
//! Conversion into the shared `cardsurvey-types` models happens here so the
//! API layer never sees raw column strings.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use cardsurvey_types::models::{
    AnswerState, OptionCounts, Privacy, Question, Survey, SurveyStatus, SurveyType, User,
    UserSurveyAnswer,
};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn to_user(&self) -> Result<User> {
        Ok(User {
            id: self.id.parse().with_context(|| format!("corrupt user id '{}'", self.id))?,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

pub struct SurveyRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub survey_type: String,
    pub questions: String,
    pub question_count: i64,
    pub responses: i64,
    pub skip_count: i64,
    pub status: String,
    pub privacy: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SurveyRow {
    pub fn into_survey(self, option_counts: Vec<(String, i64)>) -> Result<Survey> {
        let questions: Vec<Question> = serde_json::from_str(&self.questions)
            .with_context(|| format!("corrupt questions on survey '{}'", self.id))?;

        Ok(Survey {
            id: self.id.parse().with_context(|| format!("corrupt survey id '{}'", self.id))?,
            survey_type: SurveyType::parse(&self.survey_type).unwrap_or_else(|| {
                warn!("Unknown survey_type '{}' on survey '{}'", self.survey_type, self.id);
                SurveyType::Card
            }),
            question_count: u32::try_from(self.question_count).unwrap_or_default(),
            questions,
            responses: self.responses,
            skip_count: self.skip_count,
            option_counts: OptionCounts::from_pairs(option_counts),
            status: SurveyStatus::parse(&self.status)
                .with_context(|| format!("corrupt status '{}' on survey '{}'", self.status, self.id))?,
            privacy: Privacy::parse(&self.privacy).unwrap_or_else(|| {
                warn!("Unknown privacy '{}' on survey '{}'", self.privacy, self.id);
                Privacy::Private
            }),
            created_by: self
                .created_by
                .parse()
                .with_context(|| format!("corrupt created_by '{}' on survey '{}'", self.created_by, self.id))?,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            title: self.title,
            description: self.description,
        })
    }
}

pub struct AnswerRow {
    pub user_id: String,
    pub survey_id: String,
    pub question_id: String,
    pub answer_value: Option<String>,
    pub is_skipped: bool,
    pub answered_at: String,
}

impl AnswerRow {
    pub fn answer_state(&self) -> AnswerState {
        match (&self.answer_value, self.is_skipped) {
            (Some(value), false) => AnswerState::Answered(value.clone()),
            _ => AnswerState::Skipped,
        }
    }

    pub fn into_answer(self) -> Result<UserSurveyAnswer> {
        Ok(UserSurveyAnswer {
            answer: self.answer_state(),
            user_id: parse_id(&self.user_id)?,
            survey_id: parse_id(&self.survey_id)?,
            question_id: parse_id(&self.question_id)?,
            answered_at: parse_timestamp(&self.answered_at),
        })
    }
}

/// Timestamps are stored as RFC 3339 UTC with microseconds so that text
/// ordering matches time ordering.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') format, without timezone.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{}'", raw))
}
