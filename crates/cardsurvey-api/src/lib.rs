pub mod answers;
pub mod auth;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod surveys;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
