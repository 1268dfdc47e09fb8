//! services/api/src/web/comments.rs
//!
//! Threaded comment listing and comment posting.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use derecho_core::domain::{Comment, CommentNode};
use derecho_core::ports::PortError;
use derecho_core::threading::build_comment_tree;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

const ANONYMOUS_AUTHOR: &str = "Usuario";

#[derive(Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

/// A comment with its replies nested beneath it.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub article_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[schema(no_recursion)]
    pub replies: Vec<CommentResponse>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CommentThreadResponse {
    pub total: usize,
    pub comments: Vec<CommentResponse>,
}

impl CommentResponse {
    fn flat(comment: Comment) -> Self {
        Self {
            id: comment.id,
            article_id: comment.article_id,
            parent_id: comment.parent_id,
            author_id: comment.author_id,
            author_name: comment
                .author
                .map(|a| a.display_name)
                .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
            content: comment.content,
            created_at: comment.created_at,
            replies: Vec::new(),
        }
    }
}

impl From<CommentNode> for CommentResponse {
    /// Converts a whole thread without recursing, so deep chains are safe.
    fn from(root: CommentNode) -> Self {
        // A frame is a converted node plus the replies still to visit.
        let mut top = (CommentResponse::flat(root.comment), root.replies.into_iter());
        let mut stack: Vec<(CommentResponse, std::vec::IntoIter<CommentNode>)> = Vec::new();

        loop {
            let pending = match stack.last_mut() {
                Some((_, pending)) => pending,
                None => &mut top.1,
            };
            match pending.next() {
                Some(child) => {
                    stack.push((CommentResponse::flat(child.comment), child.replies.into_iter()));
                }
                None => match stack.pop() {
                    Some((done, _)) => match stack.last_mut() {
                        Some((parent, _)) => parent.replies.push(done),
                        None => top.0.replies.push(done),
                    },
                    None => return top.0,
                },
            }
        }
    }
}

/// GET /articles/{id}/comments - The article's comments as threads
#[utoipa::path(
    get,
    path = "/articles/{id}/comments",
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 200, description = "Threaded comments, oldest first", body = CommentThreadResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_comments_handler(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<CommentThreadResponse>, (StatusCode, String)> {
    let comments = state
        .db
        .get_comments_for_article(article_id)
        .await
        .map_err(|e| {
            error!("Failed to load comments: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load comments".to_string())
        })?;

    let forest = build_comment_tree(comments);
    if !forest.dropped.is_empty() {
        warn!(
            article_id = %article_id,
            dropped = ?forest.dropped,
            "Comments without a reachable parent were left out of the thread"
        );
    }

    let total = forest.total();
    Ok(Json(CommentThreadResponse {
        total,
        comments: forest.roots.into_iter().map(CommentResponse::from).collect(),
    }))
}

/// POST /articles/{id}/comments - Post a comment or a reply
#[utoipa::path(
    post,
    path = "/articles/{id}/comments",
    params(("id" = Uuid, Path, description = "Article id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Empty content or parent from another article"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Article or parent comment not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(article_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "El comentario no puede estar vacío".to_string(),
        ));
    }

    let not_found_or_500 = |what: &'static str| {
        move |e: PortError| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            other => {
                error!("Failed to load {}: {:?}", what, other);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to load {what}"))
            }
        }
    };

    state
        .db
        .get_published_article(article_id)
        .await
        .map_err(not_found_or_500("Article"))?;

    if let Some(parent_id) = req.parent_id {
        let parent = state
            .db
            .get_comment(parent_id)
            .await
            .map_err(not_found_or_500("Parent comment"))?;
        if parent.article_id != article_id {
            return Err((
                StatusCode::BAD_REQUEST,
                "Parent comment belongs to another article".to_string(),
            ));
        }
    }

    let comment = state
        .db
        .create_comment(article_id, user_id, req.parent_id, content)
        .await
        .map_err(|e| {
            error!("Failed to create comment: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create comment".to_string())
        })?;
    info!(comment_id = %comment.id, article_id = %article_id, "Comment posted");

    Ok((StatusCode::CREATED, Json(CommentResponse::flat(comment))))
}
