use serde::{Deserialize, Serialize};

use crate::models::User;

/// Pushed over the session socket on every current-user transition:
/// `{"user": {...}}` while signed in, `{"user": null}` once signed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub user: Option<User>,
}

impl SessionEvent {
    pub fn signed_in(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }

    pub fn is_signed_out(&self) -> bool {
        self.user.is_none()
    }
}
