//! crates/derecho_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The author details joined onto a comment when it is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentAuthor {
    pub display_name: String,
}

/// A single comment as stored, before threading.
///
/// `parent_id == None` marks a top-level comment; anything else is a reply to
/// the comment with that id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub article_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: Option<CommentAuthor>,
}

/// A comment placed in its thread, with its replies in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn with_replies(comment: Comment, replies: Vec<CommentNode>) -> Self {
        Self { comment, replies }
    }
}

/// One of the people credited on an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleAuthor {
    pub profile_id: Uuid,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_primary_author: bool,
}

/// A published piece on the site.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub featured: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub published_at: DateTime<Utc>,
    pub authors: Vec<ArticleAuthor>,
}

/// Moves primary authors ahead of co-authors. The sort is stable, so each
/// group keeps the order it came in.
pub fn order_authors(authors: &mut [ArticleAuthor]) {
    authors.sort_by_key(|author| !author.is_primary_author);
}

/// Moves featured articles ahead of the rest, keeping each group's order.
pub fn featured_first(articles: &mut [Article]) {
    articles.sort_by_key(|article| !article.featured);
}

/// Like state of one article as seen by one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes_count: i64,
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub email_verified: bool,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub email_verified: bool,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A single-use token mailed to a new account to prove ownership of the
/// address.
#[derive(Debug, Clone)]
pub struct VerificationToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(name: &str, primary: bool) -> ArticleAuthor {
        ArticleAuthor {
            profile_id: Uuid::new_v4(),
            display_name: Some(name.to_string()),
            bio: None,
            avatar_url: None,
            is_primary_author: primary,
        }
    }

    fn article(title: &str, featured: bool) -> Article {
        Article {
            id: Uuid::new_v4(),
            title: title.to_string(),
            excerpt: None,
            content: String::new(),
            category: None,
            featured,
            likes_count: 0,
            comments_count: 0,
            published_at: Utc::now(),
            authors: Vec::new(),
        }
    }

    #[test]
    fn primary_author_leads_and_co_authors_keep_their_order() {
        let mut authors = vec![author("b", false), author("a", true), author("c", false)];
        order_authors(&mut authors);

        let names: Vec<_> = authors.iter().filter_map(|a| a.display_name.as_deref()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn featured_articles_come_first_in_their_original_order() {
        let mut articles = vec![
            article("nuevo", false),
            article("destacado reciente", true),
            article("viejo", false),
            article("destacado antiguo", true),
        ];
        featured_first(&mut articles);

        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["destacado reciente", "destacado antiguo", "nuevo", "viejo"]
        );
    }
}
