use anyhow::anyhow;
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use cardsurvey_stats::{Aggregate, ReconcileError, StatsDelta, UnknownOptionPolicy, compute_delta};
use cardsurvey_types::models::{AnswerState, Survey, SurveyStatus, UserSurveyAnswer};

use crate::Database;
use crate::models::{AnswerRow, now_timestamp};
use crate::surveys::query_survey;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("survey not found")]
    SurveyNotFound,

    #[error("survey is {0}, not accepting answers")]
    NotActive(SurveyStatus),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for InteractionError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.into())
    }
}

/// Outcome of one answer submission.
#[derive(Debug)]
pub struct RecordedInteraction {
    pub previous: Option<AnswerState>,
    pub delta: StatsDelta,
    /// Re-read after commit.
    pub survey: Survey,
}

impl Database {
    /// Records `user_id`'s answer on a survey and reconciles the aggregate.
    ///
    /// The previous state comes from the stored answer record. Counters are
    /// changed with relative `UPDATE`s inside one transaction, so concurrent
    /// respondents never overwrite each other's increments.
    pub fn record_interaction(
        &self,
        survey_id: &Uuid,
        user_id: &Uuid,
        answer: &AnswerState,
        policy: UnknownOptionPolicy,
    ) -> Result<RecordedInteraction, InteractionError> {
        let survey_id = survey_id.to_string();
        let user_id = user_id.to_string();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let survey = query_survey(&tx, &survey_id)?.ok_or(InteractionError::SurveyNotFound)?;
            if survey.status != SurveyStatus::Active {
                return Err(InteractionError::NotActive(survey.status));
            }
            let question = survey
                .question()
                .ok_or_else(|| anyhow!("survey {} has no question", survey_id))?;

            let previous = query_answer(&tx, &user_id, &survey_id)?.map(|row| row.answer_state());
            let delta = compute_delta(previous.as_ref(), answer, &question.options, policy)?;

            if !delta.is_empty() {
                tx.execute(
                    "UPDATE surveys SET responses = responses + ?1, skip_count = skip_count + ?2
                     WHERE id = ?3",
                    (delta.responses, delta.skips, &survey_id),
                )?;
                for change in &delta.options {
                    tx.execute(
                        "UPDATE survey_option_counts SET count = count + ?1
                         WHERE survey_id = ?2 AND option_value = ?3",
                        (change.delta, &survey_id, &change.option),
                    )?;
                }
            }

            tx.execute(
                "INSERT INTO user_survey_answers
                     (user_id, survey_id, question_id, answer_value, is_skipped, answered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (user_id, survey_id) DO UPDATE SET
                     question_id = excluded.question_id,
                     answer_value = excluded.answer_value,
                     is_skipped = excluded.is_skipped,
                     answered_at = excluded.answered_at",
                rusqlite::params![
                    user_id,
                    survey_id,
                    question.id.to_string(),
                    answer.value(),
                    answer.is_skipped(),
                    now_timestamp(),
                ],
            )?;

            tx.commit()?;

            let survey = query_survey(conn, &survey_id)?.ok_or(InteractionError::SurveyNotFound)?;
            if !Aggregate::from(&survey).is_consistent() {
                warn!(
                    "Survey {} counters inconsistent: responses={} skips={} options={}",
                    survey_id,
                    survey.responses,
                    survey.skip_count,
                    survey.option_counts.total()
                );
            }
            debug!("Recorded answer on survey {}: {:?} -> {:?}", survey_id, previous, answer);

            Ok(RecordedInteraction {
                previous,
                delta,
                survey,
            })
        })
    }

    pub fn get_user_answer(&self, user_id: &Uuid, survey_id: &Uuid) -> anyhow::Result<Option<UserSurveyAnswer>> {
        let user_id = user_id.to_string();
        let survey_id = survey_id.to_string();
        self.with_conn(|conn| {
            query_answer(conn, &user_id, &survey_id)?
                .map(AnswerRow::into_answer)
                .transpose()
        })
    }
}

fn query_answer(conn: &Connection, user_id: &str, survey_id: &str) -> anyhow::Result<Option<AnswerRow>> {
    let row = conn
        .query_row(
            "SELECT user_id, survey_id, question_id, answer_value, is_skipped, answered_at
             FROM user_survey_answers WHERE user_id = ?1 AND survey_id = ?2",
            (user_id, survey_id),
            |row| {
                Ok(AnswerRow {
                    user_id: row.get(0)?,
                    survey_id: row.get(1)?,
                    question_id: row.get(2)?,
                    answer_value: row.get(3)?,
                    is_skipped: row.get(4)?,
                    answered_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    Ok(row)
}
