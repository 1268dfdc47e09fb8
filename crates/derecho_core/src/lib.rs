pub mod domain;
pub mod email;
pub mod ports;
pub mod rate_limit;
pub mod threading;

pub use domain::{
    featured_first, order_authors, Article, ArticleAuthor, AuthSession, Comment, CommentAuthor,
    CommentNode, LikeStatus, User, UserCredentials, VerificationToken,
};
pub use email::{is_suspicious_email, validate_email, EmailValidation};
pub use ports::{DatabaseService, PortError, PortResult, VerificationMailer};
pub use rate_limit::{
    email_resend_key, Clock, InMemoryRateLimitStore, RateLimitEntry, RateLimitPolicy,
    RateLimitStatus, RateLimitStore, RateLimiter, SystemClock,
};
pub use threading::{build_comment_tree, count_comments, CommentForest};
