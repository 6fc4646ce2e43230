//! Staff catalog editor: the linear add-product flow plus single-step
//! field edits.
//!
//! Unlike buyer checkout there is no reply gating here; while an editor
//! step is active, any text the staff member sends on the chat belongs
//! to it. Navigation buttons reset the step.

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::bot::render;
use crate::session::{EditorStep, Session};
use crate::store::{ProductField, ShopStore};

async fn say(bot: &Bot, chat_id: ChatId, session: &mut Session, text: &str) -> Result<()> {
    let sent = bot.send_message(chat_id, text).await?;
    session.track(sent.id);
    Ok(())
}

/// Redraws whichever staff catalog screen the session was on.
async fn redraw_catalog(
    bot: &Bot,
    chat_id: ChatId,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<()> {
    match session.catalog_category.clone() {
        Some(category) => render::draw_catalog_products(bot, chat_id, store, session, &category).await,
        None => render::draw_catalog_overview(bot, chat_id, store, session).await,
    }
}

/// Feeds a staff text message into the editor. Returns `true` when a
/// step consumed it.
pub async fn handle_staff_text(
    bot: &Bot,
    msg: &Message,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<bool> {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(false);
    };
    let text = text.to_string();

    match session.editor.clone() {
        EditorStep::Idle => Ok(false),
        EditorStep::AddName => {
            session.editor = EditorStep::AddPrice { name: text };
            say(bot, chat_id, session, "Price in KRW (digits only)?").await?;
            Ok(true)
        }
        EditorStep::AddPrice { name } => {
            let price = match text.parse::<i64>() {
                Ok(p) if p > 0 => p,
                _ => {
                    say(bot, chat_id, session, "That is not a price. Digits only, e.g. 38000.")
                        .await?;
                    session.editor = EditorStep::AddPrice { name };
                    return Ok(true);
                }
            };
            session.editor = EditorStep::AddCategory { name, price };
            say(bot, chat_id, session, "Category?").await?;
            Ok(true)
        }
        EditorStep::AddCategory { name, price } => {
            session.editor = EditorStep::AddDescription {
                name,
                price,
                category: text,
            };
            say(bot, chat_id, session, "Description? Send \"-\" to skip.").await?;
            Ok(true)
        }
        EditorStep::AddDescription {
            name,
            price,
            category,
        } => {
            // "-" is the skip sentinel here.
            let description = if text == "-" { "" } else { text.as_str() };
            let product_id = store.append_product(&name, price, &category, description)?;
            info!(product_id = %product_id, staff = chat_id.0, "Product added");

            session.editor = EditorStep::WaitPhoto {
                product_id: product_id.clone(),
            };
            session.catalog_category = Some(category);
            say(
                bot,
                chat_id,
                session,
                "✅ Product added. Send a photo for it now, or keep editing.",
            )
            .await?;
            Ok(true)
        }
        EditorStep::EditPrice { product_id } => {
            let price = match text.parse::<i64>() {
                Ok(p) if p > 0 => p,
                _ => {
                    say(bot, chat_id, session, "That is not a price. Digits only, e.g. 38000.")
                        .await?;
                    session.editor = EditorStep::EditPrice { product_id };
                    return Ok(true);
                }
            };
            if !store.update_product_field(&product_id, ProductField::Price, &price.to_string())? {
                warn!(product_id = %product_id, "Price edit on missing product");
            }
            session.editor = EditorStep::Idle;
            redraw_catalog(bot, chat_id, store, session).await?;
            Ok(true)
        }
        EditorStep::EditDescription { product_id } => {
            let description = if text == "-" { "" } else { text.as_str() };
            if !store.update_product_field(&product_id, ProductField::Description, description)? {
                warn!(product_id = %product_id, "Description edit on missing product");
            }
            session.editor = EditorStep::Idle;
            redraw_catalog(bot, chat_id, store, session).await?;
            Ok(true)
        }
        EditorStep::WaitPhoto { .. } => {
            // Waiting for a photo, not text; leave the step armed.
            Ok(false)
        }
    }
}

/// Attaches a photo to the product the editor is waiting on.
pub async fn handle_staff_photo(
    bot: &Bot,
    msg: &Message,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<bool> {
    let EditorStep::WaitPhoto { product_id } = session.editor.clone() else {
        return Ok(false);
    };
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(false);
    };

    if !store.update_product_field(&product_id, ProductField::Photo, &photo.file.id.0)? {
        warn!(product_id = %product_id, "Photo attach on missing product");
    }
    info!(product_id = %product_id, "Product photo updated");
    session.editor = EditorStep::Idle;
    redraw_catalog(bot, msg.chat.id, store, session).await?;
    Ok(true)
}
