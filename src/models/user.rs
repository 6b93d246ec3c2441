use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub wallet_address: String,
    pub email: Option<String>,
    pub twitter_handle: Option<String>,
    pub twitter_id: Option<String>,
    pub twitter_verified: bool,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub points: i64,
    pub is_verified: bool,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub referrals: i64,
}

/// Input to registration after request-level trimming.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub wallet_address: String,
    pub email: Option<String>,
    pub twitter_handle: Option<String>,
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwitterVerification {
    pub wallet_address: String,
    pub twitter_handle: String,
    pub twitter_id: String,
    pub follower_count: i64,
    pub following_project: bool,
    pub retweeted_post: bool,
}

/// Row shown on the admin dashboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSummary {
    pub wallet_address: String,
    pub twitter_handle: Option<String>,
    pub points: i64,
    pub registered_at: DateTime<Utc>,
}
