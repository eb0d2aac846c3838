use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AnswerState, Privacy, SurveyStatus, SurveyStats, User, UserSurveyAnswer};

// -- JWT Claims --

/// `sid` names the server-side session so logout can revoke the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Absent fields are left unchanged; an empty `photoURL` clears the avatar.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

// -- Surveys --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionInput {
    pub text: String,
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSurveyRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<QuestionInput>,
    #[serde(default)]
    pub privacy: Privacy,
    /// Only `draft` and `active` are accepted; defaults to `draft`.
    pub status: Option<SurveyStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSurveyRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Option<Vec<QuestionInput>>,
    pub privacy: Option<Privacy>,
}

// -- Answers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordAnswerRequest {
    pub answer: AnswerState,
}

/// `stats` is the freshest aggregate available; it may be stale or absent
/// when `success` is false.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordAnswerResponse {
    pub success: bool,
    pub stats: Option<SurveyStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserAnswerResponse {
    pub answer: Option<UserSurveyAnswer>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
