//! # BloomShop Telegram Bot
//!
//! A conversational storefront for a flower shop: per-chat sessions
//! with a single redrawn "window", a linear checkout with payment-proof
//! photos, staff order decisions and a catalog editor.

pub mod bot;
pub mod config;
pub mod models;
pub mod orders;
pub mod session;
pub mod store;
pub mod texts;
