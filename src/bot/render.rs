//! Screen rendering: the bot keeps exactly one "window" per chat.
//!
//! Every draw first deletes the messages the bot currently owns on the
//! chat, then sends the new screen and records the fresh message ids in
//! the session. Deletion is best-effort: a message the user already
//! removed (or one past Telegram's deletion age limit) is skipped.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, InputMedia, InputMediaPhoto, InlineKeyboardMarkup};
use tracing::debug;

use crate::bot::keyboards;
use crate::models::Product;
use crate::session::{Screen, Session};
use crate::store::ShopStore;
use crate::texts;

/// Telegram caps media groups at ten entries.
const ALBUM_LIMIT: usize = 10;

/// Deletes every message the bot owns on this chat and forgets them.
pub async fn clear_screen(bot: &Bot, chat_id: ChatId, session: &mut Session) {
    let owned: Vec<_> = session.owned_messages.drain(..).collect();
    for message_id in owned {
        if let Err(err) = bot.delete_message(chat_id, message_id).await {
            debug!(chat = chat_id.0, message = message_id.0, %err, "Skipping undeletable message");
        }
    }
}

async fn send_screen_text(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut Session,
    text: String,
    keyboard: InlineKeyboardMarkup,
) -> Result<()> {
    let sent = bot
        .send_message(chat_id, text)
        .reply_markup(keyboard)
        .await?;
    session.track(sent.id);
    Ok(())
}

/// Buyer-visible slice of the catalog.
fn storefront(store: &dyn ShopStore) -> Result<Vec<Product>> {
    Ok(store
        .list_products()?
        .into_iter()
        .filter(|p| p.available)
        .collect())
}

/// Distinct category names in catalog order.
fn categories_of(products: &[Product]) -> Vec<String> {
    let mut seen = Vec::new();
    for p in products {
        if !seen.contains(&p.category) {
            seen.push(p.category.clone());
        }
    }
    seen
}

pub async fn draw_home(bot: &Bot, chat_id: ChatId, session: &mut Session) -> Result<()> {
    clear_screen(bot, chat_id, session).await;
    session.screen = Screen::Home;
    send_screen_text(bot, chat_id, session, texts::home_text(), keyboards::kb_home()).await
}

/// Home screen with a one-line notice above the greeting, used after
/// actions that end elsewhere (order sent, checkout cancelled).
pub async fn draw_notice_home(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut Session,
    notice: &str,
) -> Result<()> {
    clear_screen(bot, chat_id, session).await;
    session.screen = Screen::Home;
    let text = format!("{notice}\n\n{}", texts::home_text());
    send_screen_text(bot, chat_id, session, text, keyboards::kb_home()).await
}

pub async fn draw_categories(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<()> {
    let products = storefront(store)?;
    clear_screen(bot, chat_id, session).await;
    session.screen = Screen::Categories;

    let categories = categories_of(&products);
    let text = if categories.is_empty() {
        "💐 The catalog is being restocked, check back soon!".to_string()
    } else {
        "💐 Pick a category:".to_string()
    };
    send_screen_text(bot, chat_id, session, text, keyboards::kb_categories(&categories)).await
}

/// Product picker for one category, with a photo album preview of the
/// first products that have photos (Telegram albums need 2..=10 items;
/// a single photo is sent on its own).
pub async fn draw_product_list(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
    category: &str,
) -> Result<()> {
    let products: Vec<Product> = storefront(store)?
        .into_iter()
        .filter(|p| p.category == category)
        .collect();
    clear_screen(bot, chat_id, session).await;

    if products.is_empty() {
        // Category emptied out mid-session; fall back to the list.
        return draw_categories(bot, chat_id, store, session).await;
    }
    session.screen = Screen::ProductList {
        category: category.to_string(),
    };

    let photo_ids: Vec<&String> = products
        .iter()
        .filter_map(|p| p.photo_file_id.as_ref())
        .take(ALBUM_LIMIT)
        .collect();
    if let [only] = photo_ids.as_slice() {
        let sent = bot
            .send_photo(chat_id, InputFile::file_id(FileId((*only).clone())))
            .await?;
        session.track(sent.id);
    } else if !photo_ids.is_empty() {
        let album: Vec<InputMedia> = photo_ids
            .into_iter()
            .map(|id| InputMedia::Photo(InputMediaPhoto::new(InputFile::file_id(FileId(id.clone())))))
            .collect();
        let sent = bot.send_media_group(chat_id, album).await?;
        for message in sent {
            session.track(message.id);
        }
    }

    let text = format!("💐 {category}\n\nPick a bouquet:");
    send_screen_text(bot, chat_id, session, text, keyboards::kb_products(&products)).await
}

/// Single product card: photo with caption when the product has a
/// photo, plain text otherwise. Shows the cart quantity so ➕/➖
/// redraws give immediate feedback.
pub async fn draw_product(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
    product_id: &str,
    from_category: Option<String>,
) -> Result<()> {
    let Some(product) = store.product_by_id(product_id)?.filter(|p| p.available) else {
        // Hidden or deleted since the button was drawn.
        return draw_categories(bot, chat_id, store, session).await;
    };
    clear_screen(bot, chat_id, session).await;
    session.screen = Screen::Product {
        product_id: product_id.to_string(),
        category: from_category,
    };

    let caption = texts::product_card_text(&product, session.quantity(product_id));
    let keyboard = keyboards::kb_product(product_id);
    let sent = match &product.photo_file_id {
        Some(file_id) => {
            bot.send_photo(chat_id, InputFile::file_id(FileId(file_id.clone())))
                .caption(caption)
                .reply_markup(keyboard)
                .await?
        }
        None => bot.send_message(chat_id, caption).reply_markup(keyboard).await?,
    };
    session.track(sent.id);
    Ok(())
}

pub async fn draw_cart(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<()> {
    let products = storefront(store)?;
    clear_screen(bot, chat_id, session).await;
    session.screen = Screen::Cart;

    let text = format!("🧺 Cart\n\n{}", texts::cart_text(&session.cart, &products));
    let has_items = !session.cart.is_empty();
    send_screen_text(bot, chat_id, session, text, keyboards::kb_cart(has_items)).await
}

pub async fn draw_help(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut Session,
    shop_phone: &str,
) -> Result<()> {
    clear_screen(bot, chat_id, session).await;
    session.screen = Screen::Help;
    send_screen_text(
        bot,
        chat_id,
        session,
        texts::help_text(shop_phone),
        keyboards::kb_home(),
    )
    .await
}

/// Staff catalog entry screen: one message per category plus the add
/// control. Hidden products count here, unlike the buyer storefront.
pub async fn draw_catalog_overview(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<()> {
    let products = store.list_products()?;
    clear_screen(bot, chat_id, session).await;
    session.catalog_category = None;

    for category in categories_of(&products) {
        let count = products.iter().filter(|p| p.category == category).count();
        let sent = bot
            .send_message(chat_id, format!("📁 {category} ({count})"))
            .reply_markup(keyboards::kb_catalog_category(&category))
            .await?;
        session.track(sent.id);
    }

    let sent = bot
        .send_message(chat_id, "🛠 Catalog editor")
        .reply_markup(keyboards::kb_catalog_controls())
        .await?;
    session.track(sent.id);
    Ok(())
}

/// One editable card per product in the category, hidden ones included.
pub async fn draw_catalog_products(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
    category: &str,
) -> Result<()> {
    let products: Vec<Product> = store
        .list_products()?
        .into_iter()
        .filter(|p| p.category == category)
        .collect();
    clear_screen(bot, chat_id, session).await;
    session.catalog_category = Some(category.to_string());

    for product in &products {
        let marker = if product.available { "" } else { " (hidden)" };
        let caption = format!(
            "{}{}\nPrice: {}",
            product.name,
            marker,
            texts::fmt_money(product.price)
        );
        let keyboard = keyboards::kb_catalog_item(&product.product_id, product.available);
        let sent = match &product.photo_file_id {
            Some(file_id) => {
                bot.send_photo(chat_id, InputFile::file_id(FileId(file_id.clone())))
                    .caption(caption)
                    .reply_markup(keyboard)
                    .await?
            }
            None => {
                bot.send_message(chat_id, caption)
                    .reply_markup(keyboard)
                    .await?
            }
        };
        session.track(sent.id);
    }

    let sent = bot
        .send_message(chat_id, format!("📁 {category}: {} product(s)", products.len()))
        .reply_markup(keyboards::kb_catalog_back())
        .await?;
    session.track(sent.id);
    Ok(())
}
