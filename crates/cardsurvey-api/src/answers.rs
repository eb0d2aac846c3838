use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use cardsurvey_db::InteractionError;
use cardsurvey_types::api::{Claims, RecordAnswerRequest, RecordAnswerResponse, UserAnswerResponse};
use cardsurvey_types::models::{AnswerState, SurveyStats};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::{AppState, blocking};

/// Record the caller's answer (or skip) and return the refreshed aggregate.
///
/// Storage failures do not fail the request: the response carries
/// `success: false` and whatever aggregate could still be read.
pub async fn record_answer(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<RecordAnswerRequest>,
) -> Result<Json<RecordAnswerResponse>, ApiError> {
    if let AnswerState::Answered(value) = &req.answer {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest("answer value must not be empty".into()));
        }
    }

    let user_id = claims.sub;
    let answer = req.answer;
    let outcome = blocking(&state, move |s| {
        Ok::<_, ApiError>(s.db.record_interaction(&survey_id, &user_id, &answer, s.unknown_option))
    })
    .await;

    let failure = match outcome {
        Ok(Ok(recorded)) => {
            if !recorded.delta.is_empty() {
                info!(
                    "{} answered survey {}: {:?} (responses={} skips={})",
                    claims.email, survey_id, recorded.delta, recorded.survey.responses, recorded.survey.skip_count
                );
            }
            return Ok(Json(RecordAnswerResponse {
                success: true,
                stats: Some(SurveyStats::from(&recorded.survey)),
            }));
        }
        Ok(Err(InteractionError::Storage(e))) => ApiError::Internal(e),
        Ok(Err(other)) => return Err(other.into()),
        Err(e) => e,
    };

    error!("Failed to record answer on survey {} for {}: {:?}", survey_id, claims.sub, failure);

    let stats = match blocking(&state, move |s| s.db.get_survey(&survey_id)).await {
        Ok(survey) => survey.as_ref().map(SurveyStats::from),
        Err(e) => {
            warn!("Could not re-read survey {} after failed answer: {}", survey_id, e);
            None
        }
    };

    Ok(Json(RecordAnswerResponse { success: false, stats }))
}

pub async fn my_answer(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserAnswerResponse>, ApiError> {
    let answer = blocking(&state, move |s| s.db.get_user_answer(&claims.sub, &survey_id)).await?;
    Ok(Json(UserAnswerResponse { answer }))
}
