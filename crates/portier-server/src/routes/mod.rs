//! Route handlers.
//!
//! `/authorize` and `/approve` drive the approval flow, `/auth/login` fronts the
//! upstream login page, and everything else goes through the gateway.

pub mod authorize;
pub mod gateway;
pub mod login;

pub use authorize::{ApproveForm, approve_handler, authorize_handler};
pub use gateway::{WELL_KNOWN_PREFIX, gateway_handler};
pub use login::login_handler;

use axum::response::{Html, IntoResponse, Response};

use crate::pages;
use crate::state::AppState;

/// Render `content` inside the branded layout.
fn render(state: &AppState, content: &str) -> Response {
    Html(pages::layout(content, &state.config.company_name)).into_response()
}
