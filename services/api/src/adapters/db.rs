//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derecho_core::domain::{
    Article, ArticleAuthor, AuthSession, Comment, CommentAuthor, LikeStatus, User,
    UserCredentials, VerificationToken,
};
use derecho_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Loads the credited authors of every listed article in one query.
    async fn authors_by_article(
        &self,
        article_ids: &[Uuid],
    ) -> PortResult<HashMap<Uuid, Vec<ArticleAuthor>>> {
        let records = sqlx::query_as::<_, ArticleAuthorRecord>(
            r#"
            SELECT aa.article_id, p.id AS profile_id, p.display_name, p.bio, p.avatar_url,
                   aa.is_primary_author
            FROM article_authors aa
            JOIN profiles p ON p.id = aa.profile_id
            WHERE aa.article_id = ANY($1)
            ORDER BY aa.is_primary_author DESC, aa.created_at ASC
            "#,
        )
        .bind(article_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut by_article: HashMap<Uuid, Vec<ArticleAuthor>> = HashMap::new();
        for record in records {
            let article_id = record.article_id;
            by_article.entry(article_id).or_default().push(record.to_domain());
        }
        Ok(by_article)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    email_verified: bool,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            email_verified: self.email_verified,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
    email_verified: bool,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
            email_verified: self.email_verified,
        }
    }
}

#[derive(FromRow)]
struct VerificationTokenRecord {
    token: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}
impl VerificationTokenRecord {
    fn to_domain(self) -> VerificationToken {
        VerificationToken {
            token: self.token,
            user_id: self.user_id,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct ArticleRecord {
    id: Uuid,
    title: String,
    excerpt: Option<String>,
    content: String,
    category: Option<String>,
    featured: bool,
    likes_count: i64,
    comments_count: i64,
    published_at: DateTime<Utc>,
}
impl ArticleRecord {
    fn to_domain(self, authors: Vec<ArticleAuthor>) -> Article {
        Article {
            id: self.id,
            title: self.title,
            excerpt: self.excerpt,
            content: self.content,
            category: self.category,
            featured: self.featured,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
            published_at: self.published_at,
            authors,
        }
    }
}

#[derive(FromRow)]
struct ArticleAuthorRecord {
    article_id: Uuid,
    profile_id: Uuid,
    display_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    is_primary_author: bool,
}
impl ArticleAuthorRecord {
    fn to_domain(self) -> ArticleAuthor {
        ArticleAuthor {
            profile_id: self.profile_id,
            display_name: self.display_name,
            bio: self.bio,
            avatar_url: self.avatar_url,
            is_primary_author: self.is_primary_author,
        }
    }
}

/// A comment row joined with its author's profile. The profile side is
/// nullable because the join is a LEFT JOIN.
#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    article_id: Uuid,
    author_id: Uuid,
    parent_id: Option<Uuid>,
    content: String,
    created_at: DateTime<Utc>,
    author_display_name: Option<String>,
}
impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            id: self.id,
            article_id: self.article_id,
            author_id: self.author_id,
            parent_id: self.parent_id,
            content: self.content,
            created_at: self.created_at,
            author: self
                .author_display_name
                .map(|display_name| CommentAuthor { display_name }),
        }
    }
}

const ARTICLE_COLUMNS: &str = r#"
    a.id, a.title, a.excerpt, a.content, a.category, a.featured, a.likes_count,
    (SELECT COUNT(*) FROM comments c WHERE c.article_id = a.id) AS comments_count,
    a.published_at
"#;

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
    ) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (email, hashed_password)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING user_id, email, email_verified
            "#,
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::Conflict(format!("Email {} already registered", email)))?;

        sqlx::query("INSERT INTO profiles (id, display_name) VALUES ($1, $2)")
            .bind(record.user_id)
            .bind(display_name)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password, email_verified FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET email_verified = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let (user_id,) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_verification_token(&self, token: &VerificationToken) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Only the most recently mailed link stays valid.
        sqlx::query("DELETE FROM verification_tokens WHERE user_id = $1")
            .bind(token.user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO verification_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn take_verification_token(&self, token: &str) -> PortResult<VerificationToken> {
        let record = sqlx::query_as::<_, VerificationTokenRecord>(
            "DELETE FROM verification_tokens WHERE token = $1 RETURNING token, user_id, expires_at",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || "Verification token not found".to_string()))?;
        Ok(record.to_domain())
    }

    async fn list_published_articles(&self) -> PortResult<Vec<Article>> {
        let records = sqlx::query_as::<_, ArticleRecord>(&format!(
            r#"
            SELECT {ARTICLE_COLUMNS}
            FROM articles a
            WHERE a.published
            ORDER BY a.published_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut authors = self.authors_by_article(&ids).await?;

        Ok(records
            .into_iter()
            .map(|r| {
                let credited = authors.remove(&r.id).unwrap_or_default();
                r.to_domain(credited)
            })
            .collect())
    }

    async fn get_published_article(&self, article_id: Uuid) -> PortResult<Article> {
        let record = sqlx::query_as::<_, ArticleRecord>(&format!(
            r#"
            SELECT {ARTICLE_COLUMNS}
            FROM articles a
            WHERE a.id = $1 AND a.published
            "#
        ))
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Article {} not found", article_id)))?;

        let credited = self
            .authors_by_article(&[article_id])
            .await?
            .remove(&article_id)
            .unwrap_or_default();
        Ok(record.to_domain(credited))
    }

    async fn toggle_like(&self, article_id: Uuid, user_id: Uuid) -> PortResult<LikeStatus> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let removed = sqlx::query("DELETE FROM article_likes WHERE article_id = $1 AND user_id = $2")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();

        let (liked, delta) = if removed > 0 {
            (false, -1_i64)
        } else {
            let inserted = sqlx::query(
                r#"
                INSERT INTO article_likes (article_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (article_id, user_id) DO NOTHING
                "#,
            )
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
            // A concurrent request may have inserted the same like first.
            (true, if inserted > 0 { 1 } else { 0 })
        };

        let (likes_count,) = sqlx::query_as::<_, (i64,)>(
            "UPDATE articles SET likes_count = GREATEST(likes_count + $2, 0) WHERE id = $1 RETURNING likes_count",
        )
        .bind(article_id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Article {} not found", article_id)))?;

        tx.commit().await.map_err(unexpected)?;
        Ok(LikeStatus { liked, likes_count })
    }

    async fn get_like_status(&self, article_id: Uuid, user_id: Uuid) -> PortResult<LikeStatus> {
        let (likes_count, liked) = sqlx::query_as::<_, (i64, bool)>(
            r#"
            SELECT a.likes_count,
                   EXISTS (
                       SELECT 1 FROM article_likes l
                       WHERE l.article_id = a.id AND l.user_id = $2
                   )
            FROM articles a
            WHERE a.id = $1 AND a.published
            "#,
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Article {} not found", article_id)))?;

        Ok(LikeStatus { liked, likes_count })
    }

    async fn get_comments_for_article(&self, article_id: Uuid) -> PortResult<Vec<Comment>> {
        let records = sqlx::query_as::<_, CommentRecord>(
            r#"
            SELECT c.id, c.article_id, c.author_id, c.parent_id, c.content, c.created_at,
                   p.display_name AS author_display_name
            FROM comments c
            LEFT JOIN profiles p ON p.id = c.author_id
            WHERE c.article_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(
            r#"
            SELECT c.id, c.article_id, c.author_id, c.parent_id, c.content, c.created_at,
                   p.display_name AS author_display_name
            FROM comments c
            LEFT JOIN profiles p ON p.id = c.author_id
            WHERE c.id = $1
            "#,
        )
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Comment {} not found", comment_id)))?;
        Ok(record.to_domain())
    }

    async fn create_comment(
        &self,
        article_id: Uuid,
        author_id: Uuid,
        parent_id: Option<Uuid>,
        content: &str,
    ) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (article_id, author_id, parent_id, content)
                VALUES ($1, $2, $3, $4)
                RETURNING id, article_id, author_id, parent_id, content, created_at
            )
            SELECT i.id, i.article_id, i.author_id, i.parent_id, i.content, i.created_at,
                   p.display_name AS author_display_name
            FROM inserted i
            LEFT JOIN profiles p ON p.id = i.author_id
            "#,
        )
        .bind(article_id)
        .bind(author_id)
        .bind(parent_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }
}
