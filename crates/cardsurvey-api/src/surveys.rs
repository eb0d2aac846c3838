use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use cardsurvey_db::{NewSurvey, SurveyContent};
use cardsurvey_types::api::{Claims, CreateSurveyRequest, QuestionInput, UpdateSurveyRequest};
use cardsurvey_types::models::{
    MAX_OPTIONS, MIN_OPTIONS, Privacy, Question, Survey, SurveyStats, SurveyStatus,
};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::{AppState, AppStateInner, blocking};

const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_QUESTION_LEN: usize = 500;
const MAX_OPTION_LEN: usize = 100;

pub async fn create_survey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateSurveyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match req.status.unwrap_or(SurveyStatus::Draft) {
        SurveyStatus::Closed => {
            return Err(ApiError::BadRequest(
                "a new survey must be draft or active".into(),
            ));
        }
        status => status,
    };
    let content = validate_content(&req.title, &req.description, &req.questions, req.privacy)?;

    let new = NewSurvey {
        id: Uuid::new_v4(),
        created_by: claims.sub,
        status,
        content,
    };
    let survey = blocking(&state, move |s| s.db.create_survey(&new)).await?;

    info!("{} created survey {} ({})", claims.email, survey.id, survey.status);

    Ok((StatusCode::CREATED, Json(survey)))
}

/// Drafts are only visible to their creator; anyone signed in can open an
/// active or closed survey by id, private ones included.
pub async fn get_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Survey>, ApiError> {
    let survey = blocking(&state, move |s| load_survey(s, survey_id)).await?;
    if survey.status == SurveyStatus::Draft && survey.created_by != claims.sub {
        return Err(ApiError::NotFound("survey"));
    }
    Ok(Json(survey))
}

pub async fn list_my_surveys(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Survey>>, ApiError> {
    let surveys = blocking(&state, move |s| s.db.list_surveys_by_creator(&claims.sub)).await?;
    Ok(Json(surveys))
}

pub async fn list_public_surveys(
    State(state): State<AppState>,
) -> Result<Json<Vec<Survey>>, ApiError> {
    let surveys = blocking(&state, |s| s.db.list_public_active_surveys()).await?;
    Ok(Json(surveys))
}

pub async fn update_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateSurveyRequest>,
) -> Result<Json<Survey>, ApiError> {
    let survey = blocking(&state, move |s| owned_survey(s, survey_id, claims.sub)).await?;
    if survey.status != SurveyStatus::Draft {
        return Err(ApiError::InvalidState(format!(
            "survey is {}; only drafts can be edited",
            survey.status
        )));
    }

    let current_questions: Vec<QuestionInput> = survey
        .questions
        .iter()
        .map(|q| QuestionInput {
            text: q.text.clone(),
            options: q.options.clone(),
        })
        .collect();
    let content = validate_content(
        req.title.as_deref().unwrap_or(&survey.title),
        req.description.as_deref().unwrap_or(&survey.description),
        req.questions.as_deref().unwrap_or(&current_questions),
        req.privacy.unwrap_or(survey.privacy),
    )?;
    // Keep question ids stable when the question itself was not replaced.
    let content = if req.questions.is_none() {
        SurveyContent {
            questions: survey.questions.clone(),
            ..content
        }
    } else {
        content
    };

    let updated = blocking(&state, move |s| s.db.update_draft_content(&survey_id, &content))
        .await?
        .ok_or_else(|| ApiError::InvalidState("survey is no longer a draft".into()))?;

    info!("{} edited survey {}", claims.email, survey_id);
    Ok(Json(updated))
}

/// Finalize a draft: Draft -> Active.
pub async fn publish_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Survey>, ApiError> {
    let survey = transition(&state, survey_id, &claims, SurveyStatus::Draft, SurveyStatus::Active).await?;
    info!("{} published survey {}", claims.email, survey_id);
    Ok(Json(survey))
}

/// Stop accepting answers: Active -> Closed.
pub async fn close_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Survey>, ApiError> {
    let survey = transition(&state, survey_id, &claims, SurveyStatus::Active, SurveyStatus::Closed).await?;
    info!("{} closed survey {}", claims.email, survey_id);
    Ok(Json(survey))
}

pub async fn delete_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |s| {
        let survey = owned_survey(s, survey_id, claims.sub)?;
        if survey.status != SurveyStatus::Draft {
            return Err(ApiError::InvalidState(format!(
                "survey is {}; only drafts can be deleted",
                survey.status
            )));
        }
        if !s.db.delete_draft_survey(&survey_id)? {
            return Err(ApiError::InvalidState("survey is no longer a draft".into()));
        }
        Ok(())
    })
    .await?;

    info!("{} deleted draft survey {}", claims.email, survey_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn survey_stats(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SurveyStats>, ApiError> {
    let survey = blocking(&state, move |s| owned_survey(s, survey_id, claims.sub)).await?;
    Ok(Json(SurveyStats::from(&survey)))
}

async fn transition(
    state: &AppState,
    survey_id: Uuid,
    claims: &Claims,
    from: SurveyStatus,
    to: SurveyStatus,
) -> Result<Survey, ApiError> {
    let user_id = claims.sub;
    blocking(state, move |s| {
        let survey = owned_survey(s, survey_id, user_id)?;
        if !survey.status.can_transition_to(to) || !s.db.transition_status(&survey_id, from, to)? {
            return Err(ApiError::InvalidState(format!(
                "cannot move survey from {} to {}",
                survey.status, to
            )));
        }
        load_survey(s, survey_id)
    })
    .await
}

fn load_survey(s: &AppStateInner, survey_id: Uuid) -> Result<Survey, ApiError> {
    s.db.get_survey(&survey_id)?.ok_or(ApiError::NotFound("survey"))
}

/// Loads a survey the caller must own; anyone else gets `Forbidden`.
fn owned_survey(s: &AppStateInner, survey_id: Uuid, user_id: Uuid) -> Result<Survey, ApiError> {
    let survey = load_survey(s, survey_id)?;
    if survey.created_by != user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(survey)
}

/// Trim and check a card's content. Fresh question ids are assigned.
pub fn validate_content(
    title: &str,
    description: &str,
    questions: &[QuestionInput],
    privacy: Privacy,
) -> Result<SurveyContent, ApiError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::BadRequest(format!("title must be 1-{} characters", MAX_TITLE_LEN)));
    }
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::BadRequest(format!(
            "description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }

    let [question] = questions else {
        return Err(ApiError::BadRequest("a survey card has exactly one question".into()));
    };

    let text = question.text.trim();
    if text.is_empty() || text.chars().count() > MAX_QUESTION_LEN {
        return Err(ApiError::BadRequest(format!(
            "question must be 1-{} characters",
            MAX_QUESTION_LEN
        )));
    }

    let options: Vec<String> = question.options.iter().map(|o| o.trim().to_string()).collect();
    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err(ApiError::BadRequest(format!(
            "a card needs {}-{} options",
            MIN_OPTIONS, MAX_OPTIONS
        )));
    }
    if options.iter().any(|o| o.is_empty() || o.chars().count() > MAX_OPTION_LEN) {
        return Err(ApiError::BadRequest(format!(
            "options must be 1-{} characters",
            MAX_OPTION_LEN
        )));
    }
    let distinct = {
        let mut seen = HashSet::new();
        options.iter().all(|o| seen.insert(o.as_str()))
    };
    if !distinct {
        return Err(ApiError::BadRequest("options must be distinct".into()));
    }

    Ok(SurveyContent {
        title: title.to_string(),
        description: description.to_string(),
        questions: vec![Question {
            id: Uuid::new_v4(),
            text: text.to_string(),
            options,
        }],
        privacy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str, options: &[&str]) -> Vec<QuestionInput> {
        vec![QuestionInput {
            text: text.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }]
    }

    #[test]
    fn content_is_trimmed() {
        let content = validate_content(
            "  Lunch ",
            "",
            &input(" Pizza? ", &[" Yes", "No "]),
            Privacy::Public,
        )
        .unwrap();
        assert_eq!(content.title, "Lunch");
        assert_eq!(content.questions[0].text, "Pizza?");
        assert_eq!(content.questions[0].options, vec!["Yes", "No"]);
    }

    #[test]
    fn option_count_is_bounded() {
        let ok = |opts: &[&str]| validate_content("t", "", &input("q", opts), Privacy::Public).is_ok();
        assert!(!ok(&["only"]));
        assert!(ok(&["a", "b"]));
        assert!(ok(&["a", "b", "c", "d", "e"]));
        assert!(!ok(&["a", "b", "c", "d", "e", "f"]));
    }

    #[test]
    fn duplicate_or_blank_options_rejected() {
        assert!(validate_content("t", "", &input("q", &["Yes", " Yes"]), Privacy::Public).is_err());
        assert!(validate_content("t", "", &input("q", &["Yes", "  "]), Privacy::Public).is_err());
    }

    #[test]
    fn card_has_exactly_one_question() {
        assert!(validate_content("t", "", &[], Privacy::Public).is_err());
        let mut two = input("q1", &["a", "b"]);
        two.extend(input("q2", &["c", "d"]));
        assert!(validate_content("t", "", &two, Privacy::Public).is_err());
    }
}
