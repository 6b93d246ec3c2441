//! Airdrop campaign backend: wallet registration, referral credit, a task
//! ledger that awards points, and a simulated points-to-tokens distribution.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod referral;
pub mod registry;
pub mod tasks;
pub mod tokens;
pub mod twitter;
pub mod wallet;
