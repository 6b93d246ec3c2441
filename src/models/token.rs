use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionStatus {
    Pending,
    Completed,
}

impl DistributionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(DistributionStatus::Pending),
            "completed" => Some(DistributionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenDistribution {
    pub wallet_address: String,
    pub tokens_earned: i64,
    pub tokens_distributed: i64,
    pub distribution_tx_hash: Option<String>,
    pub distribution_status: String,
    pub distribution_date: Option<DateTime<Utc>>,
    pub points_used: i64,
}

impl TokenDistribution {
    pub fn status(&self) -> Option<DistributionStatus> {
        DistributionStatus::parse(&self.distribution_status)
    }
}

/// A recorded distribution. The hash is simulated; nothing is submitted to a chain.
#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    pub tokens: i64,
    pub tx_hash: String,
    pub points_used: i64,
}

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Distributed(Distribution),
    Insufficient { earned: i64, required: i64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTokens {
    pub points: i64,
    pub tokens_earned: i64,
    pub tokens_distributed: i64,
    pub distribution_status: Option<DistributionStatus>,
    pub tx_hash: Option<String>,
    pub points_to_tokens_ratio: i64,
    pub next_tokens: i64,
}

#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct DistributionStats {
    pub total_users: i64,
    pub total_tokens_earned: i64,
    pub total_tokens_distributed: i64,
    pub distributions_completed: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecentDistribution {
    pub wallet_address: String,
    pub tokens_distributed: i64,
    pub distribution_tx_hash: Option<String>,
    pub distribution_date: Option<DateTime<Utc>>,
}
