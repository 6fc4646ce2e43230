//! Environment-driven configuration, loaded once at startup.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::env;
use teloxide::types::ChatId;

const DEFAULT_SHOP_PHONE: &str = "010-1234-5678";

/// Static runtime configuration. Staff identity is a plain allow-list;
/// there is no other authentication.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub database_path: String,
    pub staff_chat_ids: HashSet<ChatId>,
    pub owner_chat_id: ChatId,
    pub shop_phone: String,
}

impl Config {
    /// Reads configuration from the environment. Missing required
    /// variables fail startup.
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let database_path = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let owner_chat_id = env::var("OWNER_CHAT_ID")
            .context("OWNER_CHAT_ID must be set")?
            .parse::<i64>()
            .context("OWNER_CHAT_ID must be an integer chat id")?;
        let staff_chat_ids = parse_staff_ids(&env::var("STAFF_CHAT_IDS").unwrap_or_default());
        let shop_phone =
            env::var("SHOP_PHONE").unwrap_or_else(|_| DEFAULT_SHOP_PHONE.to_string());

        Ok(Self {
            bot_token,
            database_path,
            staff_chat_ids,
            owner_chat_id: ChatId(owner_chat_id),
            shop_phone,
        })
    }

    pub fn is_staff(&self, chat_id: ChatId) -> bool {
        self.staff_chat_ids.contains(&chat_id)
    }

    pub fn is_owner(&self, chat_id: ChatId) -> bool {
        self.owner_chat_id == chat_id
    }
}

/// Parses the comma-separated staff allow-list, skipping anything that
/// is not an integer.
fn parse_staff_ids(raw: &str) -> HashSet<ChatId> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .map(ChatId)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_staff_ids() {
        let ids = parse_staff_ids("123, 456,789");
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&ChatId(456)));
    }

    #[test]
    fn test_parse_staff_ids_skips_garbage() {
        let ids = parse_staff_ids("123,abc, ,-77");
        assert!(ids.contains(&ChatId(123)));
        assert!(ids.contains(&ChatId(-77)));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_parse_staff_ids_empty() {
        assert!(parse_staff_ids("").is_empty());
    }
}
