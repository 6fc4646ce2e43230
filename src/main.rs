use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bloomshop::bot;
use bloomshop::config::Config;
use bloomshop::session::SessionStore;
use bloomshop::store::{ShopStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!(database = %config.database_path, "Starting BloomShop bot");

    let store: Arc<dyn ShopStore> = Arc::new(SqliteStore::open(&config.database_path)?);
    let sessions = SessionStore::new();
    let bot = Bot::new(config.bot_token.clone());

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::handle_message))
        .branch(Update::filter_callback_query().endpoint(bot::handle_callback));

    info!("Dispatcher starting");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![store, sessions, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
