use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use cardsurvey_types::api::{AuthResponse, Claims, LoginRequest, SignupRequest, UpdateProfileRequest};
use cardsurvey_types::events::SessionEvent;
use cardsurvey_types::models::User;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::authenticate;
use crate::state::{AppState, AppStateInner, blocking};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_DISPLAY_NAME_LEN: usize = 64;

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::WeakPassword);
    }
    let display_name = validate_display_name(&req.display_name)?;

    let (user, token) = blocking(&state, move |s| {
        if s.db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::EmailInUse);
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        let user_id = Uuid::new_v4();
        // A concurrent signup may have taken the email since the check above.
        if !s.db.create_user(&user_id.to_string(), &email, &password_hash, &display_name)? {
            return Err(ApiError::EmailInUse);
        }

        let user = load_user(s, user_id)?;
        let token = start_session(s, &user)?;
        Ok::<_, ApiError>((user, token))
    })
    .await?;

    info!("New account {} ({})", user.email, user.id);

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    let (user, token) = blocking(&state, move |s| {
        let row = s
            .db
            .get_user_by_email(&email)?
            .ok_or(ApiError::InvalidCredentials)?;

        let parsed_hash = PasswordHash::new(&row.password)
            .map_err(|e| anyhow::anyhow!("stored password hash unreadable: {}", e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::InvalidCredentials)?;

        let user = row.to_user()?;
        let token = start_session(s, &user)?;
        Ok::<_, ApiError>((user, token))
    })
    .await?;

    info!("{} ({}) logged in", user.email, user.id);

    Ok(Json(AuthResponse { user, token }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let sid = claims.sid.to_string();
    let revoked = blocking(&state, move |s| s.db.revoke_session(&sid)).await?;
    if !revoked {
        warn!("Logout for session {} that was already revoked", claims.sid);
    }

    state
        .sessions
        .notify(claims.sub, Some(claims.sid), SessionEvent::signed_out())
        .await;

    info!("{} logged out", claims.email);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let user = blocking(&state, move |s| load_user(s, claims.sub)).await?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let display_name = req
        .display_name
        .as_deref()
        .map(validate_display_name)
        .transpose()?;
    let photo_url = req.photo_url.as_deref().map(validate_photo_url).transpose()?;

    let user = blocking(&state, move |s| {
        let row = s
            .db
            .update_profile(
                &claims.sub.to_string(),
                display_name.as_deref(),
                photo_url.as_ref().map(|p| p.as_deref()),
            )?
            .ok_or(ApiError::Unauthorized)?;
        Ok::<_, ApiError>(row.to_user()?)
    })
    .await?;

    state
        .sessions
        .notify(user.id, None, SessionEvent::signed_in(user.clone()))
        .await;

    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub token: String,
}

/// Current-user subscription. Browsers cannot set headers on a WebSocket
/// upgrade, so the token travels in the query string.
pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authenticate(&state, &query.token).await?;
    Ok(ws.on_upgrade(move |socket| run_session_feed(socket, state, claims)))
}

async fn run_session_feed(socket: WebSocket, state: AppState, claims: Claims) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the user so no change slips in between.
    let mut rx = state.sessions.subscribe(claims.sub).await;

    let current = match blocking(&state, move |s| load_user(s, claims.sub)).await {
        Ok(user) => SessionEvent::signed_in(user),
        Err(e) => {
            warn!("Session feed for {} could not load user: {}", claims.sub, e);
            SessionEvent::signed_out()
        }
    };
    let done = current.is_signed_out();
    if send_event(&mut sender, &current).await.is_err() || done {
        state.sessions.unsubscribe(claims.sub, rx).await;
        return;
    }

    info!("{} subscribed to session events", claims.email);

    loop {
        tokio::select! {
            result = rx.recv() => {
                let msg = match result {
                    Ok(msg) => msg,
                    Err(RecvError::Lagged(n)) => {
                        warn!("Session feed for {} lagged by {} events", claims.sub, n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !msg.is_for(claims.sid) {
                    continue;
                }
                let signed_out = msg.event.is_signed_out();
                if send_event(&mut sender, &msg.event).await.is_err() || signed_out {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.sessions.unsubscribe(claims.sub, rx).await;
    let _ = sender.send(Message::Close(None)).await;
    info!("{} session feed closed", claims.email);
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &SessionEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(Message::Text(text.into())).await
}

fn load_user(s: &AppStateInner, user_id: Uuid) -> Result<User, ApiError> {
    let row = s
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(ApiError::Unauthorized)?;
    Ok(row.to_user()?)
}

/// Record a new session and sign a token naming it.
fn start_session(s: &AppStateInner, user: &User) -> Result<String, ApiError> {
    let session_id = Uuid::new_v4();
    s.db.create_session(&session_id.to_string(), &user.id.to_string())?;
    Ok(create_token(&s.jwt_secret, s.token_ttl, user, session_id)?)
}

fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    user: &User,
    session_id: Uuid,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        sid: session_id,
        email: user.email.clone(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid { Ok(email) } else { Err(ApiError::InvalidEmail) }
}

fn validate_display_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "display name must be 1-{} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// An empty string clears the avatar.
fn validate_photo_url(raw: &str) -> Result<Option<String>, ApiError> {
    let url = raw.trim();
    if url.is_empty() {
        return Ok(None);
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ApiError::BadRequest("photoURL must be an http(s) URL".into()));
    }
    Ok(Some(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "@example.com", "ada@example", "ada@.com", "a da@example.com"] {
            assert!(matches!(normalize_email(bad), Err(ApiError::InvalidEmail)), "{bad}");
        }
    }

    #[test]
    fn display_names_are_bounded() {
        assert_eq!(validate_display_name("  Ada ").unwrap(), "Ada");
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn photo_url_empty_clears() {
        assert_eq!(validate_photo_url("").unwrap(), None);
        assert_eq!(
            validate_photo_url("https://cdn.example.com/a.png").unwrap().as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert!(validate_photo_url("javascript:alert(1)").is_err());
    }
}
