use crate::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Token economics. Passed to the accounting code explicitly, never read from globals.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub token_name: String,
    pub token_symbol: String,
    /// Informational only; no accounting rule depends on it.
    pub total_supply: u64,
    pub points_to_tokens_ratio: i64,
    pub min_points_for_distribution: i64,
    pub min_claim_tokens: i64,
    pub distribution_date: String,
    pub referral_bonus_points: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_name: "TEST".into(),
            token_symbol: "TEST".into(),
            total_supply: 1_000_000,
            points_to_tokens_ratio: 10,
            min_points_for_distribution: 100,
            min_claim_tokens: 10,
            distribution_date: "2024-12-31".into(),
            referral_bonus_points: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub bearer_token: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Project account users must follow, without the leading `@`.
    pub username: String,
    pub timeout: Duration,
    pub simulate_on_error: bool,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            api_key: None,
            api_secret: None,
            username: String::new(),
            timeout: Duration::from_secs(10),
            simulate_on_error: true,
        }
    }
}

impl TwitterConfig {
    pub fn has_credentials(&self) -> bool {
        self.bearer_token.is_some() || (self.api_key.is_some() && self.api_secret.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub token: TokenConfig,
    pub twitter: TwitterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://airdrop.db?mode=rwc".into(),
            host: "0.0.0.0".into(),
            port: 5000,
            token: TokenConfig::default(),
            twitter: TwitterConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = TokenConfig {
            token_name: get("TOKEN_NAME").unwrap_or(defaults.token.token_name),
            token_symbol: get("TOKEN_SYMBOL").unwrap_or(defaults.token.token_symbol),
            total_supply: parse_or(&get, "TOKEN_TOTAL_SUPPLY", defaults.token.total_supply)?,
            points_to_tokens_ratio: parse_or(
                &get,
                "POINTS_TO_TOKENS_RATIO",
                defaults.token.points_to_tokens_ratio,
            )?,
            min_points_for_distribution: parse_or(
                &get,
                "MIN_POINTS_FOR_DISTRIBUTION",
                defaults.token.min_points_for_distribution,
            )?,
            min_claim_tokens: parse_or(&get, "MIN_CLAIM_TOKENS", defaults.token.min_claim_tokens)?,
            distribution_date: get("DISTRIBUTION_DATE")
                .unwrap_or(defaults.token.distribution_date),
            referral_bonus_points: parse_or(
                &get,
                "REFERRAL_BONUS_POINTS",
                defaults.token.referral_bonus_points,
            )?,
        };

        if token.points_to_tokens_ratio <= 0 {
            return Err(AppError::Config(
                "POINTS_TO_TOKENS_RATIO must be greater than zero".into(),
            ));
        }
        if token.referral_bonus_points < 0 || token.min_claim_tokens < 0 {
            return Err(AppError::Config(
                "REFERRAL_BONUS_POINTS and MIN_CLAIM_TOKENS must not be negative".into(),
            ));
        }

        let twitter = TwitterConfig {
            bearer_token: get("TWITTER_BEARER_TOKEN"),
            api_key: get("TWITTER_API_KEY"),
            api_secret: get("TWITTER_API_SECRET"),
            username: get("TWITTER_USERNAME")
                .map(|u| u.replace('@', ""))
                .unwrap_or_default(),
            timeout: Duration::from_secs(parse_or(&get, "TWITTER_TIMEOUT_SECS", 10u64)?),
            simulate_on_error: parse_or(
                &get,
                "TWITTER_SIMULATE_ON_ERROR",
                defaults.twitter.simulate_on_error,
            )?,
        };

        Ok(Config {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(&get, "PORT", defaults.port)?,
            token,
            twitter,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.token.points_to_tokens_ratio, 10);
        assert_eq!(config.token.min_claim_tokens, 10);
        assert_eq!(config.token.referral_bonus_points, 50);
        assert!(!config.twitter.has_credentials());
        assert!(config.twitter.simulate_on_error);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("POINTS_TO_TOKENS_RATIO", "20"),
            ("TOKEN_SYMBOL", "ECO"),
            ("TWITTER_USERNAME", "@project"),
            ("TWITTER_API_KEY", "k"),
            ("TWITTER_API_SECRET", "s"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.token.points_to_tokens_ratio, 20);
        assert_eq!(config.token.token_symbol, "ECO");
        assert_eq!(config.twitter.username, "project");
        assert!(config.twitter.has_credentials());
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn zero_ratio_is_rejected() {
        let err = config_from(&[("POINTS_TO_TOKENS_RATIO", "0")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
