use std::collections::HashMap;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use cardsurvey_types::models::{Privacy, Question, Survey, SurveyStatus, SurveyType};

use crate::Database;
use crate::models::{SurveyRow, now_timestamp};

const SURVEY_COLUMNS: &str = "id, title, description, survey_type, questions, question_count, \
     responses, skip_count, status, privacy, created_by, created_at, updated_at";

/// Everything a creator may edit while the survey is a draft.
#[derive(Debug, Clone)]
pub struct SurveyContent {
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub privacy: Privacy,
}

#[derive(Debug, Clone)]
pub struct NewSurvey {
    pub id: Uuid,
    pub created_by: Uuid,
    pub status: SurveyStatus,
    pub content: SurveyContent,
}

impl Database {
    pub fn create_survey(&self, survey: &NewSurvey) -> Result<Survey> {
        let questions = serde_json::to_string(&survey.content.questions)?;
        let id = survey.id.to_string();

        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO surveys (id, title, description, survey_type, questions, question_count,
                                      status, privacy, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                rusqlite::params![
                    id,
                    survey.content.title,
                    survey.content.description,
                    SurveyType::Card.as_str(),
                    questions,
                    survey.content.questions.len() as i64,
                    survey.status.as_str(),
                    survey.content.privacy.as_str(),
                    survey.created_by.to_string(),
                    now,
                ],
            )?;
            insert_option_counts(&tx, &id, &survey.content.questions)?;
            tx.commit()?;

            query_survey(conn, &id)?.ok_or_else(|| anyhow!("survey {} vanished after insert", id))
        })
    }

    pub fn get_survey(&self, id: &Uuid) -> Result<Option<Survey>> {
        let id = id.to_string();
        self.with_conn(|conn| query_survey(conn, &id))
    }

    /// All surveys created by `user_id`, newest first.
    pub fn list_surveys_by_creator(&self, user_id: &Uuid) -> Result<Vec<Survey>> {
        let user_id = user_id.to_string();
        self.with_conn(|conn| {
            query_surveys(
                conn,
                &format!(
                    "SELECT {} FROM surveys WHERE created_by = ?1 ORDER BY created_at DESC, rowid DESC",
                    SURVEY_COLUMNS
                ),
                &[&user_id],
            )
        })
    }

    /// Public, active, single-question surveys, newest first.
    pub fn list_public_active_surveys(&self) -> Result<Vec<Survey>> {
        self.with_conn(|conn| {
            query_surveys(
                conn,
                &format!(
                    "SELECT {} FROM surveys
                     WHERE status = 'active' AND privacy = 'public' AND question_count = 1
                     ORDER BY created_at DESC, rowid DESC",
                    SURVEY_COLUMNS
                ),
                &[],
            )
        })
    }

    /// Replaces a draft's content and resets its option counters.
    /// Returns `None` when the survey is missing or no longer a draft.
    pub fn update_draft_content(&self, id: &Uuid, content: &SurveyContent) -> Result<Option<Survey>> {
        let questions = serde_json::to_string(&content.questions)?;
        let id = id.to_string();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE surveys
                 SET title = ?1, description = ?2, questions = ?3, question_count = ?4,
                     privacy = ?5, updated_at = ?6
                 WHERE id = ?7 AND status = 'draft'",
                rusqlite::params![
                    content.title,
                    content.description,
                    questions,
                    content.questions.len() as i64,
                    content.privacy.as_str(),
                    now_timestamp(),
                    id,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            tx.execute("DELETE FROM survey_option_counts WHERE survey_id = ?1", [&id])?;
            insert_option_counts(&tx, &id, &content.questions)?;
            tx.commit()?;

            query_survey(conn, &id)
        })
    }

    /// Moves a survey from `from` to `to` in one statement, so two
    /// concurrent transitions cannot both succeed. Returns false when the
    /// survey was not in `from`.
    pub fn transition_status(&self, id: &Uuid, from: SurveyStatus, to: SurveyStatus) -> Result<bool> {
        let id = id.to_string();
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE surveys SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                (to.as_str(), now_timestamp(), &id, from.as_str()),
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes a survey only while it is a draft; counters and answers go
    /// with it. Returns false when nothing was deleted.
    pub fn delete_draft_survey(&self, id: &Uuid) -> Result<bool> {
        let id = id.to_string();
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM surveys WHERE id = ?1 AND status = 'draft'",
                [&id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn insert_option_counts(conn: &Connection, survey_id: &str, questions: &[Question]) -> Result<()> {
    let Some(question) = questions.first() else {
        return Ok(());
    };

    let mut stmt = conn.prepare(
        "INSERT INTO survey_option_counts (survey_id, position, option_value, count)
         VALUES (?1, ?2, ?3, 0)",
    )?;
    for (position, option) in question.options.iter().enumerate() {
        stmt.execute((survey_id, position as i64, option))?;
    }
    Ok(())
}

fn survey_row(row: &Row<'_>) -> rusqlite::Result<SurveyRow> {
    Ok(SurveyRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        survey_type: row.get(3)?,
        questions: row.get(4)?,
        question_count: row.get(5)?,
        responses: row.get(6)?,
        skip_count: row.get(7)?,
        status: row.get(8)?,
        privacy: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub(crate) fn query_survey(conn: &Connection, id: &str) -> Result<Option<Survey>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM surveys WHERE id = ?1", SURVEY_COLUMNS),
            [id],
            survey_row,
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut counts = query_option_counts(conn, &[row.id.clone()])?;
    let pairs = counts.remove(&row.id).unwrap_or_default();
    Ok(Some(row.into_survey(pairs)?))
}

fn query_surveys(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<Survey>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, survey_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut counts = query_option_counts(conn, &ids)?;

    rows.into_iter()
        .map(|row| {
            let pairs = counts.remove(&row.id).unwrap_or_default();
            row.into_survey(pairs)
        })
        .collect()
}

/// Batch-fetch option counters for a set of surveys, in option order.
fn query_option_counts(conn: &Connection, survey_ids: &[String]) -> Result<HashMap<String, Vec<(String, i64)>>> {
    let mut by_survey: HashMap<String, Vec<(String, i64)>> = HashMap::new();
    if survey_ids.is_empty() {
        return Ok(by_survey);
    }

    let placeholders: Vec<String> = (1..=survey_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT survey_id, option_value, count FROM survey_option_counts
         WHERE survey_id IN ({})
         ORDER BY survey_id, position",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = survey_ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt.query_map(params.as_slice(), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
    })?;

    for row in rows {
        let (survey_id, option, count) = row?;
        by_survey.entry(survey_id).or_default().push((option, count));
    }

    Ok(by_survey)
}
