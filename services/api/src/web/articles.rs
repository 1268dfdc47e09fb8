//! services/api/src/web/articles.rs
//!
//! Published articles and per-reader likes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use derecho_core::domain::{featured_first, order_authors, Article, ArticleAuthor, LikeStatus};
use derecho_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

/// A credited author as shown on article cards and pages.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ArticleAuthorResponse {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_primary_author: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ArticleSummary {
    pub id: Uuid,
    pub title: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub featured: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub published_at: DateTime<Utc>,
    /// Primary author first.
    pub authors: Vec<ArticleAuthorResponse>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ArticleResponse {
    pub id: Uuid,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub featured: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub published_at: DateTime<Utc>,
    /// Primary author first.
    pub authors: Vec<ArticleAuthorResponse>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LikeStatusResponse {
    pub liked: bool,
    pub likes_count: i64,
}

impl From<ArticleAuthor> for ArticleAuthorResponse {
    fn from(author: ArticleAuthor) -> Self {
        Self {
            id: author.profile_id,
            display_name: author.display_name,
            bio: author.bio,
            avatar_url: author.avatar_url,
            is_primary_author: author.is_primary_author,
        }
    }
}

fn credited_authors(mut authors: Vec<ArticleAuthor>) -> Vec<ArticleAuthorResponse> {
    order_authors(&mut authors);
    authors.into_iter().map(ArticleAuthorResponse::from).collect()
}

impl From<Article> for ArticleSummary {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            excerpt: article.excerpt,
            category: article.category,
            featured: article.featured,
            likes_count: article.likes_count,
            comments_count: article.comments_count,
            published_at: article.published_at,
            authors: credited_authors(article.authors),
        }
    }
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            excerpt: article.excerpt,
            content: article.content,
            category: article.category,
            featured: article.featured,
            likes_count: article.likes_count,
            comments_count: article.comments_count,
            published_at: article.published_at,
            authors: credited_authors(article.authors),
        }
    }
}

impl From<LikeStatus> for LikeStatusResponse {
    fn from(status: LikeStatus) -> Self {
        Self {
            liked: status.liked,
            likes_count: status.likes_count,
        }
    }
}

fn map_port_error(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Article not found".to_string()),
        other => {
            error!("{}: {:?}", context, other);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

/// GET /articles - Published articles: featured ones first, then newest first
#[utoipa::path(
    get,
    path = "/articles",
    responses(
        (status = 200, description = "Published articles, featured first", body = [ArticleSummary]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_articles_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ArticleSummary>>, (StatusCode, String)> {
    let mut articles = state
        .db
        .list_published_articles()
        .await
        .map_err(|e| map_port_error("Failed to list articles", e))?;
    featured_first(&mut articles);

    Ok(Json(articles.into_iter().map(ArticleSummary::from).collect()))
}

/// GET /articles/{id} - A single published article
#[utoipa::path(
    get,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 200, description = "The article", body = ArticleResponse),
        (status = 404, description = "Article not found or not published"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_article_handler(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<ArticleResponse>, (StatusCode, String)> {
    let article = state
        .db
        .get_published_article(article_id)
        .await
        .map_err(|e| map_port_error("Failed to load article", e))?;

    Ok(Json(article.into()))
}

/// POST /articles/{id}/like - Like the article, or take the like back
#[utoipa::path(
    post,
    path = "/articles/{id}/like",
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 200, description = "New like state", body = LikeStatusResponse),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Article not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn toggle_like_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<LikeStatusResponse>, (StatusCode, String)> {
    state
        .db
        .get_published_article(article_id)
        .await
        .map_err(|e| map_port_error("Failed to load article", e))?;

    let status = state
        .db
        .toggle_like(article_id, user_id)
        .await
        .map_err(|e| map_port_error("Failed to toggle like", e))?;
    debug!(article_id = %article_id, liked = status.liked, "Like toggled");

    Ok(Json(status.into()))
}

/// GET /articles/{id}/like - Whether the current reader likes the article
#[utoipa::path(
    get,
    path = "/articles/{id}/like",
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 200, description = "Current like state", body = LikeStatusResponse),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Article not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn like_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<LikeStatusResponse>, (StatusCode, String)> {
    state
        .db
        .get_published_article(article_id)
        .await
        .map_err(|e| map_port_error("Failed to load article", e))?;

    let status = state
        .db
        .get_like_status(article_id, user_id)
        .await
        .map_err(|e| map_port_error("Failed to load like status", e))?;

    Ok(Json(status.into()))
}
