use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The fixed task catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    JoinAirdrop,
    FollowTwitter,
    Retweet,
    JoinTelegram,
    InviteFriends,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::JoinAirdrop,
        TaskKind::FollowTwitter,
        TaskKind::Retweet,
        TaskKind::JoinTelegram,
        TaskKind::InviteFriends,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::JoinAirdrop => "join_airdrop",
            TaskKind::FollowTwitter => "follow_twitter",
            TaskKind::Retweet => "retweet",
            TaskKind::JoinTelegram => "join_telegram",
            TaskKind::InviteFriends => "invite_friends",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            TaskKind::JoinAirdrop => "Join Airdrop",
            TaskKind::FollowTwitter => "Follow us on Twitter",
            TaskKind::Retweet => "Retweet our pinned post",
            TaskKind::JoinTelegram => "Join our Telegram",
            TaskKind::InviteFriends => "Invite 3 friends",
        }
    }

    pub fn points(self) -> i64 {
        match self {
            TaskKind::JoinAirdrop => 100,
            TaskKind::FollowTwitter => 50,
            TaskKind::Retweet => 75,
            TaskKind::JoinTelegram => 50,
            TaskKind::InviteFriends => 150,
        }
    }

    pub fn max_points() -> i64 {
        Self::ALL.iter().map(|t| t.points()).sum()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTask(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTask(s.to_string()))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRecord {
    pub task_name: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Completed { points: i64 },
    AlreadyCompleted,
    NotFound,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskState {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDescription {
    pub name: &'static str,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: usize,
    pub points: i64,
    pub max_points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub tasks: BTreeMap<String, TaskState>,
    pub descriptions: BTreeMap<&'static str, TaskDescription>,
    pub progress: TaskProgress,
}
