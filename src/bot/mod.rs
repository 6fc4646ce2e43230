//! Telegram-facing layer.
//!
//! - `message_handler`: commands, checkout replies, editor input
//! - `callback_handler`: inline button dispatch
//! - `checkout_flow` / `editor_flow`: the two step machines
//! - `render`: the one-window screen drawing
//! - `keyboards`: inline keyboard builders

pub mod callback_handler;
pub mod checkout_flow;
pub mod editor_flow;
pub mod keyboards;
pub mod message_handler;
pub mod render;

pub use callback_handler::handle_callback;
pub use message_handler::handle_message;
