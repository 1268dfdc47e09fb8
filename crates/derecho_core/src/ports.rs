//! crates/derecho_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or mail.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Article, AuthSession, Comment, LikeStatus, User, UserCredentials, VerificationToken,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Accounts ---
    /// Creates an unverified account together with its public profile.
    /// Fails with `Conflict` when the address is taken.
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn mark_email_verified(&self, user_id: Uuid) -> PortResult<()>;

    // --- Auth Sessions ---
    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()>;

    /// Returns the owner of a live session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Email Verification ---
    async fn create_verification_token(&self, token: &VerificationToken) -> PortResult<()>;

    /// Removes the token and returns it; a token can be redeemed once.
    async fn take_verification_token(&self, token: &str) -> PortResult<VerificationToken>;

    // --- Articles and Likes ---
    /// Published articles, newest first, each with its credited authors.
    async fn list_published_articles(&self) -> PortResult<Vec<Article>>;

    async fn get_published_article(&self, article_id: Uuid) -> PortResult<Article>;

    /// Likes the article if the user has not, unlikes it otherwise.
    async fn toggle_like(&self, article_id: Uuid, user_id: Uuid) -> PortResult<LikeStatus>;

    /// `NotFound` unless the article is published.
    async fn get_like_status(&self, article_id: Uuid, user_id: Uuid) -> PortResult<LikeStatus>;

    // --- Comments ---
    /// Every comment of the article, oldest first, with author details.
    async fn get_comments_for_article(&self, article_id: Uuid) -> PortResult<Vec<Comment>>;

    async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment>;

    async fn create_comment(
        &self,
        article_id: Uuid,
        author_id: Uuid,
        parent_id: Option<Uuid>,
        content: &str,
    ) -> PortResult<Comment>;
}

#[async_trait]
pub trait VerificationMailer: Send + Sync {
    /// Hands a verification token for `email` to the delivery mechanism.
    async fn send_verification(&self, email: &str, token: &str) -> PortResult<()>;
}
