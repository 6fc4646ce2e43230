//! Buyer checkout: a linear sequence of force-reply prompts.
//!
//! Each step records the message id of its own prompt, and a text or
//! photo message only advances the flow when it is a reply to that
//! exact prompt. Anything else on the chat is left for the command and
//! navigation handlers.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ForceReply, MessageId};
use tracing::{debug, warn};

use crate::bot::keyboards;
use crate::session::{CheckoutStep, Session};
use crate::store::ShopStore;
use crate::texts;

async fn send_prompt(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut Session,
    text: &str,
) -> Result<MessageId> {
    let sent = bot
        .send_message(chat_id, text)
        .reply_markup(ForceReply::new())
        .await?;
    session.track(sent.id);
    Ok(sent.id)
}

/// Clears the screen and asks for the buyer's name. Entry point of the
/// flow; the cart must already be non-empty.
pub async fn start(bot: &Bot, chat_id: ChatId, session: &mut Session) -> Result<()> {
    crate::bot::render::clear_screen(bot, chat_id, session).await;
    let prompt = send_prompt(bot, chat_id, session, "Your name?").await?;
    session.checkout = CheckoutStep::AskName { prompt };
    Ok(())
}

fn is_reply_to(msg: &Message, prompt: MessageId) -> bool {
    msg.reply_to_message().map(|r| r.id) == Some(prompt)
}

fn trimmed_text(msg: &Message) -> Option<&str> {
    msg.text().map(str::trim).filter(|t| !t.is_empty())
}

/// Feeds a text message into the checkout flow. Returns `true` when
/// the message was consumed by a step, `false` when checkout has no
/// claim on it.
pub async fn handle_reply(
    bot: &Bot,
    msg: &Message,
    store: &dyn ShopStore,
    session: &mut Session,
) -> Result<bool> {
    let chat_id = msg.chat.id;
    match session.checkout.clone() {
        CheckoutStep::AskName { prompt } => {
            if !is_reply_to(msg, prompt) {
                return Ok(false);
            }
            let Some(real_name) = trimmed_text(msg) else {
                let prompt = send_prompt(bot, chat_id, session, "Your name?").await?;
                session.checkout = CheckoutStep::AskName { prompt };
                return Ok(true);
            };
            let real_name = real_name.to_string();
            let prompt = send_prompt(bot, chat_id, session, "Your phone number?").await?;
            session.checkout = CheckoutStep::AskPhone { prompt, real_name };
            Ok(true)
        }
        CheckoutStep::AskPhone { prompt, real_name } => {
            if !is_reply_to(msg, prompt) {
                return Ok(false);
            }
            let Some(phone) = trimmed_text(msg) else {
                let prompt = send_prompt(bot, chat_id, session, "Your phone number?").await?;
                session.checkout = CheckoutStep::AskPhone { prompt, real_name };
                return Ok(true);
            };
            let phone = phone.to_string();
            if !store.save_user_contacts(chat_id.0, &real_name, &phone)? {
                warn!(chat = chat_id.0, "Contact capture for unregistered user");
            }

            let sent = bot
                .send_message(chat_id, "How would you like to receive the order?")
                .reply_markup(keyboards::kb_checkout_kind())
                .await?;
            session.track(sent.id);
            session.checkout = CheckoutStep::PickKind { real_name, phone };
            Ok(true)
        }
        CheckoutStep::Comment {
            prompt,
            real_name,
            phone,
            kind,
        } => {
            if !is_reply_to(msg, prompt) {
                return Ok(false);
            }
            let Some(comment) = trimmed_text(msg) else {
                let prompt =
                    send_prompt(bot, chat_id, session, "A comment for the order? (\"-\" for none)")
                        .await?;
                session.checkout = CheckoutStep::Comment {
                    prompt,
                    real_name,
                    phone,
                    kind,
                };
                return Ok(true);
            };
            let comment = comment.to_string();

            let preview = texts::checkout_preview(
                &session.cart,
                &store.list_products()?,
                kind.label(),
                &comment,
            );
            let sent = bot
                .send_message(chat_id, preview)
                .reply_markup(keyboards::kb_checkout_preview())
                .await?;
            session.track(sent.id);
            session.checkout = CheckoutStep::WaitPhoto {
                prompt: None,
                real_name,
                phone,
                kind,
                comment,
            };
            Ok(true)
        }
        CheckoutStep::Idle
        | CheckoutStep::PickKind { .. }
        | CheckoutStep::WaitPhoto { .. }
        | CheckoutStep::ReadyToSend { .. } => Ok(false),
    }
}

/// Accepts the payment-proof photo. Only a photo replying to the
/// attach prompt counts; stray photos are ignored.
pub async fn handle_payment_photo(
    bot: &Bot,
    msg: &Message,
    session: &mut Session,
) -> Result<bool> {
    let CheckoutStep::WaitPhoto {
        prompt: Some(prompt),
        real_name,
        phone,
        kind,
        comment,
    } = session.checkout.clone()
    else {
        return Ok(false);
    };
    if !is_reply_to(msg, prompt) {
        debug!(chat = msg.chat.id.0, "Photo does not reply to the attach prompt");
        return Ok(false);
    }
    // Largest rendition of the photo.
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(false);
    };

    session.checkout = CheckoutStep::ReadyToSend {
        real_name,
        phone,
        kind,
        comment,
        payment_photo: photo.file.id.0.clone(),
    };
    let sent = bot
        .send_message(msg.chat.id, "📎 Payment photo attached. Send the order?")
        .reply_markup(keyboards::kb_checkout_send())
        .await?;
    session.track(sent.id);
    Ok(true)
}

/// Asks for the payment photo after the attach button. Stores the
/// prompt id so only replies to it are accepted.
pub async fn ask_payment_photo(bot: &Bot, chat_id: ChatId, session: &mut Session) -> Result<bool> {
    let CheckoutStep::WaitPhoto {
        real_name,
        phone,
        kind,
        comment,
        ..
    } = session.checkout.clone()
    else {
        return Ok(false);
    };
    let prompt = send_prompt(
        bot,
        chat_id,
        session,
        "Reply to this message with a photo of your payment.",
    )
    .await?;
    session.checkout = CheckoutStep::WaitPhoto {
        prompt: Some(prompt),
        real_name,
        phone,
        kind,
        comment,
    };
    Ok(true)
}
