//! Incoming message handler: commands, checkout replies, editor input
//! and photos, partitioned by the staff allow-list.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::bot::{checkout_flow, editor_flow, render};
use crate::config::Config;
use crate::models::BuyerProfile;
use crate::orders;
use crate::session::{Session, SessionStore};
use crate::store::ShopStore;
use crate::texts;

pub async fn handle_message(
    bot: Bot,
    msg: Message,
    store: Arc<dyn ShopStore>,
    sessions: SessionStore,
    config: Config,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let mut session = sessions.session(chat_id).await;
    let store = store.as_ref();

    if let Some(command) = msg.text().map(str::trim).filter(|t| t.starts_with('/')) {
        return handle_command(&bot, &msg, command, store, &mut session, &config).await;
    }

    // Staff input first: an armed editor step claims text and photos.
    if config.is_staff(chat_id) || config.is_owner(chat_id) {
        if msg.photo().is_some() {
            if editor_flow::handle_staff_photo(&bot, &msg, store, &mut session).await? {
                return Ok(());
            }
        } else if editor_flow::handle_staff_text(&bot, &msg, store, &mut session).await? {
            return Ok(());
        }
    }

    if msg.photo().is_some() {
        if checkout_flow::handle_payment_photo(&bot, &msg, &mut session).await? {
            return Ok(());
        }
        debug!(chat = chat_id.0, "Stray photo ignored");
        return Ok(());
    }

    if checkout_flow::handle_reply(&bot, &msg, store, &mut session).await? {
        return Ok(());
    }
    if session.checkout.in_progress() {
        // A reply that missed the active prompt. Dropping it keeps the
        // live prompt on screen; redrawing here would delete it.
        debug!(chat = chat_id.0, "Stale checkout reply dropped");
        return Ok(());
    }

    // Free text outside any flow: redraw home rather than stay silent.
    debug!(chat = chat_id.0, "Unclaimed text, drawing home");
    render::draw_home(&bot, chat_id, &mut session).await
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    command: &str,
    store: &dyn ShopStore,
    session: &mut Session,
    config: &Config,
) -> Result<()> {
    let chat_id = msg.chat.id;
    match command.split_whitespace().next().unwrap_or(command) {
        "/start" => {
            register_if_new(msg, store)?;
            session.reset_checkout();
            render::draw_home(bot, chat_id, session).await
        }
        "/catalog" if config.is_staff(chat_id) || config.is_owner(chat_id) => {
            render::draw_catalog_overview(bot, chat_id, store, session).await
        }
        "/dash" if config.is_owner(chat_id) => {
            let stats = orders::dashboard_stats(&store.list_orders()?, Utc::now());
            render::clear_screen(bot, chat_id, session).await;
            let sent = bot.send_message(chat_id, texts::dashboard_text(&stats)).await?;
            session.track(sent.id);
            Ok(())
        }
        _ => {
            debug!(chat = chat_id.0, command, "Unknown or unauthorized command");
            render::draw_home(bot, chat_id, session).await
        }
    }
}

/// First-contact registration, keyed on the sending user.
fn register_if_new(msg: &Message, store: &dyn ShopStore) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let profile = BuyerProfile {
        chat_id: msg.chat.id.0,
        username: user.username.clone().unwrap_or_default(),
        full_name: user.full_name(),
    };
    if store.register_user_if_new(&profile, &Utc::now().to_rfc3339())? {
        info!(chat = profile.chat_id, "New user registered");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CheckoutStep;
    use crate::store::MemStore;
    use std::collections::HashSet;
    use teloxide::types::MessageId;

    fn test_config() -> Config {
        Config {
            bot_token: "123:TEST".to_string(),
            database_path: ":memory:".to_string(),
            staff_chat_ids: HashSet::new(),
            owner_chat_id: ChatId(1),
            shop_phone: "010-1234-5678".to_string(),
        }
    }

    fn text_reply(chat_id: i64, reply_to: i32, text: &str) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": 100,
            "date": 1_693_300_000,
            "chat": {"id": chat_id, "type": "private", "first_name": "Kim"},
            "from": {"id": chat_id, "is_bot": false, "first_name": "Kim"},
            "reply_to_message": {
                "message_id": reply_to,
                "date": 1_693_299_000,
                "chat": {"id": chat_id, "type": "private", "first_name": "Kim"},
                "from": {"id": 7_777, "is_bot": true, "first_name": "ShopBot"},
                "text": "old prompt"
            },
            "text": text
        }))
        .expect("valid message payload")
    }

    #[tokio::test]
    async fn test_reply_to_deleted_prompt_keeps_checkout_screen() -> Result<()> {
        let bot = Bot::new("123:TEST");
        let store: Arc<dyn ShopStore> = Arc::new(MemStore::new());
        let sessions = SessionStore::new();
        let chat = ChatId(42);

        {
            let mut session = sessions.session(chat).await;
            session.checkout = CheckoutStep::AskName {
                prompt: MessageId(10),
            };
            session.track(MessageId(10));
        }

        // A reply targeting a prompt that no longer exists must be
        // dropped without touching the screen or the step.
        let msg = text_reply(42, 5, "Kim Minji");
        handle_message(bot, msg, Arc::clone(&store), sessions.clone(), test_config()).await?;

        let session = sessions.session(chat).await;
        assert_eq!(
            session.checkout,
            CheckoutStep::AskName {
                prompt: MessageId(10)
            }
        );
        assert!(session.owned_messages.contains(&MessageId(10)));
        Ok(())
    }
}
