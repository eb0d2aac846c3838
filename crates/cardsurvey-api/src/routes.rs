use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{answers, auth, surveys};

/// All API routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        // Authenticates from the query string itself.
        .route("/auth/events", get(auth::events))
        .route("/health", get(|| async { "ok" }))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/surveys", post(surveys::create_survey))
        .route("/surveys/mine", get(surveys::list_my_surveys))
        .route("/surveys/public", get(surveys::list_public_surveys))
        .route(
            "/surveys/{survey_id}",
            get(surveys::get_survey)
                .put(surveys::update_survey)
                .delete(surveys::delete_survey),
        )
        .route("/surveys/{survey_id}/publish", post(surveys::publish_survey))
        .route("/surveys/{survey_id}/close", post(surveys::close_survey))
        .route("/surveys/{survey_id}/stats", get(surveys::survey_stats))
        .route(
            "/surveys/{survey_id}/answer",
            get(answers::my_answer).post(answers::record_answer),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
