pub mod articles;
pub mod auth;
pub mod comments;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::AppState;

/// Builds every API route over the shared state.
///
/// Routes under the auth layer see the caller's user id as an `Extension<Uuid>`.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/verify", post(auth::verify_handler))
        .route("/auth/resend", post(auth::resend_verification_handler))
        .route("/auth/resend/status", get(auth::resend_status_handler))
        .route("/auth/validate-email", post(auth::validate_email_handler))
        .route("/articles", get(articles::list_articles_handler))
        .route("/articles/{id}", get(articles::get_article_handler))
        .route("/articles/{id}/comments", get(comments::list_comments_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/articles/{id}/comments", post(comments::create_comment_handler))
        .route(
            "/articles/{id}/like",
            get(articles::like_status_handler).post(articles::toggle_like_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
