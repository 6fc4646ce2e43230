//! Callback-query router. Every inline button lands here and is
//! dispatched on its payload prefix; the chat's session is locked for
//! the whole interaction so handlers never interleave per chat.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{FileId, ForceReply, InputFile, MessageId};
use tracing::{debug, error, warn};

use crate::bot::{checkout_flow, keyboards, render};
use crate::config::Config;
use crate::models::{BuyerProfile, Fulfillment, OrderStatus};
use crate::orders::{self, DecisionAction, DecisionOutcome};
use crate::session::{CheckoutStep, EditorStep, Screen, Session, SessionStore};
use crate::store::{ProductField, ShopStore};
use crate::texts;

/// Text for the callback-query answer; alert answers pop a dialog
/// instead of a toast.
struct Answer {
    text: String,
    alert: bool,
}

impl Answer {
    fn toast(text: impl Into<String>) -> Option<Self> {
        Some(Self {
            text: text.into(),
            alert: false,
        })
    }

    fn alert(text: impl Into<String>) -> Option<Self> {
        Some(Self {
            text: text.into(),
            alert: true,
        })
    }
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    store: Arc<dyn ShopStore>,
    sessions: SessionStore,
    config: Config,
) -> Result<()> {
    let answer = match (q.data.as_deref(), q.message.as_ref()) {
        (Some(data), Some(message)) => {
            let chat_id = message.chat().id;
            let message_id = message.id();
            let data = data.to_string();
            let mut session = sessions.session(chat_id).await;
            dispatch(
                &bot,
                &q,
                &data,
                chat_id,
                message_id,
                store.as_ref(),
                &mut session,
                &config,
            )
            .await?
        }
        _ => {
            debug!("Callback without data or message, ignoring");
            None
        }
    };

    let mut request = bot.answer_callback_query(q.id.clone());
    if let Some(Answer { text, alert }) = answer {
        request = request.text(text).show_alert(alert);
    }
    request.await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    bot: &Bot,
    q: &CallbackQuery,
    data: &str,
    chat_id: ChatId,
    message_id: MessageId,
    store: &dyn ShopStore,
    session: &mut Session,
    config: &Config,
) -> Result<Option<Answer>> {
    debug!(chat = chat_id.0, data, "Callback");

    match data {
        "home:catalog" | "nav:catalog" | "nav:categories" => {
            render::draw_categories(bot, chat_id, store, session).await?;
            return Ok(None);
        }
        "home:cart" | "nav:cart" => {
            render::draw_cart(bot, chat_id, store, session).await?;
            return Ok(None);
        }
        "home:help" => {
            render::draw_help(bot, chat_id, session, &config.shop_phone).await?;
            return Ok(None);
        }
        "nav:home" => {
            render::draw_home(bot, chat_id, session).await?;
            return Ok(None);
        }
        "nav:back" => {
            return handle_back(bot, chat_id, store, session).await;
        }
        _ => {}
    }

    if let Some(category) = data.strip_prefix("cat:") {
        render::draw_product_list(bot, chat_id, store, session, category).await?;
        return Ok(None);
    }
    if let Some(product_id) = data.strip_prefix("prod:") {
        let from_category = match &session.screen {
            Screen::ProductList { category } => Some(category.clone()),
            _ => None,
        };
        render::draw_product(bot, chat_id, store, session, product_id, from_category).await?;
        return Ok(None);
    }
    if let Some(rest) = data.strip_prefix("cart:") {
        return handle_cart(bot, rest, chat_id, store, session).await;
    }
    if let Some(rest) = data.strip_prefix("checkout:") {
        return handle_checkout_button(bot, q, rest, chat_id, store, session, config).await;
    }
    if let Some(rest) = data.strip_prefix("staff:") {
        return handle_decision(bot, rest, chat_id, message_id, store, config).await;
    }
    if let Some(rest) = data.strip_prefix("catalog:") {
        return handle_catalog(bot, rest, chat_id, store, session, config).await;
    }

    warn!(chat = chat_id.0, data, "Unknown callback payload");
    Ok(None)
}

/// Back resolves against the current screen: a product card returns to
/// the category it was opened from (the category list when there is
/// none), a product list returns to the categories, anything else goes
/// home.
async fn handle_back(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<Option<Answer>> {
    match session.screen.clone() {
        Screen::Product {
            category: Some(category),
            ..
        } => render::draw_product_list(bot, chat_id, store, session, &category).await?,
        Screen::Product { category: None, .. } | Screen::ProductList { .. } => {
            render::draw_categories(bot, chat_id, store, session).await?
        }
        _ => render::draw_home(bot, chat_id, session).await?,
    }
    Ok(None)
}

async fn handle_cart(
    bot: &Bot,
    action: &str,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<Option<Answer>> {
    if action == "clear" {
        session.clear_cart();
        render::draw_cart(bot, chat_id, store, session).await?;
        return Ok(None);
    }

    if let Some(product_id) = action.strip_prefix("inc:") {
        let qty = session.add_one(product_id);
        redraw_product_card(bot, chat_id, store, session, product_id).await?;
        return Ok(Answer::toast(format!("In cart: {qty}")));
    }
    if let Some(product_id) = action.strip_prefix("dec:") {
        let qty = session.remove_one(product_id);
        redraw_product_card(bot, chat_id, store, session, product_id).await?;
        return Ok(Answer::toast(format!("In cart: {qty}")));
    }

    warn!(action, "Unknown cart action");
    Ok(None)
}

/// After ➕/➖ the card is redrawn so its quantity line stays current.
async fn redraw_product_card(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
    product_id: &str,
) -> Result<()> {
    let from_category = match &session.screen {
        Screen::Product { category, .. } => category.clone(),
        _ => None,
    };
    render::draw_product(bot, chat_id, store, session, product_id, from_category).await
}

async fn handle_checkout_button(
    bot: &Bot,
    q: &CallbackQuery,
    action: &str,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
    config: &Config,
) -> Result<Option<Answer>> {
    match action {
        "start" => {
            if session.cart.is_empty() {
                return Ok(Answer::alert("The cart is empty."));
            }
            checkout_flow::start(bot, chat_id, session).await?;
            Ok(None)
        }
        "cancel" => {
            session.reset_checkout();
            render::draw_cart(bot, chat_id, store, session).await?;
            Ok(None)
        }
        "attach" => {
            if !checkout_flow::ask_payment_photo(bot, chat_id, session).await? {
                debug!(chat = chat_id.0, "Attach button outside the photo step");
            }
            Ok(None)
        }
        "final_send" => send_order(bot, q, chat_id, store, session, config).await,
        _ => {
            if let Some(kind) = action.strip_prefix("type:") {
                return pick_kind(bot, kind, chat_id, session).await;
            }
            warn!(action, "Unknown checkout action");
            Ok(None)
        }
    }
}

/// Fulfillment choice; only meaningful while the flow is at the kind
/// picker, a stale button press elsewhere is ignored.
async fn pick_kind(
    bot: &Bot,
    kind: &str,
    chat_id: ChatId,
    session: &mut Session,
) -> Result<Option<Answer>> {
    let CheckoutStep::PickKind { real_name, phone } = session.checkout.clone() else {
        debug!(chat = chat_id.0, "Kind button outside the picker step");
        return Ok(None);
    };
    let Some(kind) = Fulfillment::parse(kind) else {
        warn!(kind, "Unknown fulfillment payload");
        return Ok(None);
    };

    let sent = bot
        .send_message(chat_id, "A comment for the order? Send \"-\" for none.")
        .reply_markup(ForceReply::new())
        .await?;
    session.track(sent.id);
    session.checkout = CheckoutStep::Comment {
        prompt: sent.id,
        real_name,
        phone,
        kind,
    };
    Ok(None)
}

/// Final submit: writes the order, attaches the payment proof and fans
/// the notification out to the staff chats. Buyer state is cleared only
/// after the order is durably stored.
async fn send_order(
    bot: &Bot,
    q: &CallbackQuery,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
    config: &Config,
) -> Result<Option<Answer>> {
    let CheckoutStep::ReadyToSend {
        real_name,
        phone,
        kind,
        comment,
        payment_photo,
    } = session.checkout.clone()
    else {
        debug!(chat = chat_id.0, "Send button outside the ready step");
        return Ok(None);
    };
    if session.cart.is_empty() {
        debug!(chat = chat_id.0, "Send button with an empty cart");
        return Ok(None);
    }

    let buyer = BuyerProfile {
        chat_id: chat_id.0,
        username: q.from.username.clone().unwrap_or_default(),
        full_name: q.from.full_name(),
    };
    let stored = orders::create_order(store, &buyer, &session.cart, kind, &comment, Utc::now())
        .and_then(|order_id| {
            orders::submit_payment(store, &order_id, &payment_photo)?;
            Ok(order_id)
        });
    let order_id = match stored {
        Ok(order_id) => order_id,
        Err(err) => {
            // Keep cart and step so the buyer can press send again.
            error!(chat = chat_id.0, %err, "Failed to store order");
            return Ok(Answer::alert(texts::order_failed_text()));
        }
    };

    notify_staff(bot, store, config, &order_id, &real_name, &phone, &payment_photo).await;

    session.clear_cart();
    session.reset_checkout();
    render::draw_notice_home(bot, chat_id, session, &texts::order_sent_text()).await?;
    Ok(None)
}

/// Sends the payment photo with the order summary and approve/reject
/// buttons to every staff chat. Individual send failures are logged
/// and skipped; the order is already stored.
async fn notify_staff(
    bot: &Bot,
    store: &dyn ShopStore,
    config: &Config,
    order_id: &str,
    real_name: &str,
    phone: &str,
    payment_photo: &str,
) {
    let caption = match store.order_by_id(order_id) {
        Ok(Some(order)) => format!(
            "{}\nBuyer: {} (@{})\nPhone: {}",
            texts::staff_order_caption(&order),
            real_name,
            order.buyer_username,
            phone
        ),
        Ok(None) | Err(_) => {
            warn!(order_id, "Order vanished before staff notification");
            return;
        }
    };

    for staff_chat in &config.staff_chat_ids {
        let result = bot
            .send_photo(
                *staff_chat,
                InputFile::file_id(FileId(payment_photo.to_string())),
            )
            .caption(caption.clone())
            .reply_markup(keyboards::kb_staff_order(order_id))
            .await;
        if let Err(err) = result {
            warn!(staff = staff_chat.0, order_id, %err, "Staff notification failed");
        }
    }
}

/// Approve/reject button on a staff notification. The first decision
/// wins; later presses get an alert naming the recorded status.
async fn handle_decision(
    bot: &Bot,
    payload: &str,
    chat_id: ChatId,
    message_id: MessageId,
    store: &dyn ShopStore,
    config: &Config,
) -> Result<Option<Answer>> {
    if !config.is_staff(chat_id) && !config.is_owner(chat_id) {
        warn!(chat = chat_id.0, "Decision from a non-staff chat");
        return Ok(Answer::alert("Not allowed."));
    }
    let Some((action, order_id)) = payload.split_once(':') else {
        warn!(payload, "Malformed decision payload");
        return Ok(None);
    };
    let Some(action) = DecisionAction::parse(action) else {
        warn!(payload, "Unknown decision action");
        return Ok(None);
    };

    match orders::decide(store, order_id, chat_id.0, action, Utc::now())? {
        DecisionOutcome::Applied {
            buyer_chat_id,
            status,
        } => {
            let approved = status == OrderStatus::Approved;

            // Stamp the decision into the notification caption; this
            // also drops the approve/reject buttons.
            if let Ok(Some(order)) = store.order_by_id(order_id) {
                let stamp = if approved { "✅ Approved" } else { "❌ Rejected" };
                let caption = format!("{}\n\n{stamp}", texts::staff_order_caption(&order));
                if let Err(err) = bot
                    .edit_message_caption(chat_id, message_id)
                    .caption(caption)
                    .await
                {
                    debug!(order_id, %err, "Could not edit decision caption");
                }
            }

            if let Err(err) = bot
                .send_message(ChatId(buyer_chat_id), texts::buyer_decision_text(approved))
                .await
            {
                warn!(buyer = buyer_chat_id, order_id, %err, "Buyer notification failed");
            }
            Ok(Answer::toast(if approved { "Approved" } else { "Rejected" }))
        }
        DecisionOutcome::AlreadyHandled { status } => {
            Ok(Answer::alert(format!("Already handled: {status}")))
        }
        DecisionOutcome::NotFound => Ok(Answer::alert("Order not found.")),
    }
}

async fn handle_catalog(
    bot: &Bot,
    action: &str,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
    config: &Config,
) -> Result<Option<Answer>> {
    if !config.is_staff(chat_id) && !config.is_owner(chat_id) {
        warn!(chat = chat_id.0, "Catalog action from a non-staff chat");
        return Ok(Answer::alert("Not allowed."));
    }

    match action {
        "add" => {
            session.editor = EditorStep::AddName;
            let sent = bot.send_message(chat_id, "New product name?").await?;
            session.track(sent.id);
            return Ok(None);
        }
        "back" => {
            session.editor = EditorStep::Idle;
            render::draw_catalog_overview(bot, chat_id, store, session).await?;
            return Ok(None);
        }
        _ => {}
    }

    if let Some(category) = action.strip_prefix("cat:") {
        session.editor = EditorStep::Idle;
        render::draw_catalog_products(bot, chat_id, store, session, category).await?;
        return Ok(None);
    }
    if let Some(product_id) = action.strip_prefix("toggle:") {
        let Some(product) = store.product_by_id(product_id)? else {
            return Ok(Answer::alert("Product not found."));
        };
        let flag = if product.available { "0" } else { "1" };
        store.update_product_field(product_id, ProductField::Available, flag)?;
        if let Some(category) = session.catalog_category.clone() {
            render::draw_catalog_products(bot, chat_id, store, session, &category).await?;
        }
        return Ok(None);
    }
    if let Some(product_id) = action.strip_prefix("price:") {
        session.editor = EditorStep::EditPrice {
            product_id: product_id.to_string(),
        };
        let sent = bot.send_message(chat_id, "New price in KRW?").await?;
        session.track(sent.id);
        return Ok(None);
    }
    if let Some(product_id) = action.strip_prefix("desc:") {
        session.editor = EditorStep::EditDescription {
            product_id: product_id.to_string(),
        };
        let sent = bot
            .send_message(chat_id, "New description? Send \"-\" to clear.")
            .await?;
        session.track(sent.id);
        return Ok(None);
    }
    if let Some(product_id) = action.strip_prefix("photo:") {
        session.editor = EditorStep::WaitPhoto {
            product_id: product_id.to_string(),
        };
        let sent = bot.send_message(chat_id, "Send the new photo.").await?;
        session.track(sent.id);
        return Ok(None);
    }

    warn!(action, "Unknown catalog action");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use std::collections::HashSet;

    fn test_config() -> Config {
        Config {
            bot_token: "123:TEST".to_string(),
            database_path: ":memory:".to_string(),
            staff_chat_ids: HashSet::new(),
            owner_chat_id: ChatId(1),
            shop_phone: "010-1234-5678".to_string(),
        }
    }

    fn callback_query(from_id: i64, data: &str) -> CallbackQuery {
        serde_json::from_value(serde_json::json!({
            "id": "q1",
            "from": {"id": from_id, "is_bot": false, "first_name": "Kim"},
            "chat_instance": "ci",
            "data": data
        }))
        .expect("valid callback payload")
    }

    #[tokio::test]
    async fn test_final_send_with_empty_cart_is_dropped_silently() -> Result<()> {
        let bot = Bot::new("123:TEST");
        let store = MemStore::new();
        let config = test_config();
        let q = callback_query(42, "checkout:final_send");

        let mut session = Session::default();
        session.checkout = CheckoutStep::ReadyToSend {
            real_name: "Kim Minji".to_string(),
            phone: "010-5555-0101".to_string(),
            kind: Fulfillment::Pickup,
            comment: String::new(),
            payment_photo: "proof".to_string(),
        };

        // Cart is empty: the press is logged and ignored, no answer
        // text, no order written, state left for a later interaction.
        let answer = send_order(&bot, &q, ChatId(42), &store, &mut session, &config).await?;
        assert!(answer.is_none());
        assert!(store.list_orders()?.is_empty());
        assert!(matches!(session.checkout, CheckoutStep::ReadyToSend { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_final_send_outside_ready_step_is_dropped_silently() -> Result<()> {
        let bot = Bot::new("123:TEST");
        let store = MemStore::new();
        let config = test_config();
        let q = callback_query(42, "checkout:final_send");

        let mut session = Session::default();
        session.add_one("P1");

        let answer = send_order(&bot, &q, ChatId(42), &store, &mut session, &config).await?;
        assert!(answer.is_none());
        assert!(store.list_orders()?.is_empty());
        Ok(())
    }
}
