//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification and the health check.

use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::web::{articles, auth, comments};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::verify_handler,
        auth::resend_verification_handler,
        auth::resend_status_handler,
        auth::validate_email_handler,
        articles::list_articles_handler,
        articles::get_article_handler,
        articles::toggle_like_handler,
        articles::like_status_handler,
        comments::list_comments_handler,
        comments::create_comment_handler,
    ),
    components(
        schemas(
            HealthResponse,
            auth::SignupRequest,
            auth::SignupResponse,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::VerifyRequest,
            auth::EmailRequest,
            auth::MessageResponse,
            auth::RateLimitStatusResponse,
            auth::EmailValidationResponse,
            articles::ArticleAuthorResponse,
            articles::ArticleSummary,
            articles::ArticleResponse,
            articles::LikeStatusResponse,
            comments::CreateCommentRequest,
            comments::CommentResponse,
            comments::CommentThreadResponse,
        )
    ),
    tags(
        (name = "Derecho en Perspectiva API", description = "Articles, threaded comments and reader accounts.")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
