//! Per-chat session state: cart, current screen, step machines and the
//! message ids the bot currently owns on that chat's screen.
//!
//! Every "waiting for X" moment lives in a tagged step enum so that a
//! step can only carry the data that is valid for it; there are no
//! loose flag fields to fall out of sync.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::Fulfillment;

/// The screen currently drawn for a chat. Variants carry the context
/// needed to resolve back-navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    #[default]
    Home,
    Categories,
    ProductList {
        category: String,
    },
    Product {
        product_id: String,
        /// Category the buyer came from, if they navigated through one.
        category: Option<String>,
    },
    Cart,
    Help,
}

/// Buyer checkout step machine. Linear: each reply-gated variant
/// records the prompt message a reply must target; replies to anything
/// else are dropped as stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutStep {
    #[default]
    Idle,
    AskName {
        prompt: MessageId,
    },
    AskPhone {
        prompt: MessageId,
        real_name: String,
    },
    PickKind {
        real_name: String,
        phone: String,
    },
    Comment {
        prompt: MessageId,
        real_name: String,
        phone: String,
        kind: Fulfillment,
    },
    WaitPhoto {
        /// Set once the buyer presses the attach button; photo replies
        /// are only accepted against this prompt.
        prompt: Option<MessageId>,
        real_name: String,
        phone: String,
        kind: Fulfillment,
        comment: String,
    },
    ReadyToSend {
        real_name: String,
        phone: String,
        kind: Fulfillment,
        comment: String,
        payment_photo: String,
    },
}

impl CheckoutStep {
    pub fn in_progress(&self) -> bool {
        !matches!(self, CheckoutStep::Idle)
    }
}

/// Staff catalog editor steps: the linear add-product flow plus
/// single-step per-field edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorStep {
    #[default]
    Idle,
    AddName,
    AddPrice {
        name: String,
    },
    AddCategory {
        name: String,
        price: i64,
    },
    AddDescription {
        name: String,
        price: i64,
        category: String,
    },
    EditPrice {
        product_id: String,
    },
    EditDescription {
        product_id: String,
    },
    WaitPhoto {
        product_id: String,
    },
}

/// Everything the engine remembers about one chat. Created zero-valued
/// on first contact and kept for the process lifetime; nothing here is
/// persisted across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// product id -> quantity; a key is removed when it would reach 0.
    pub cart: BTreeMap<String, u32>,
    pub screen: Screen,
    /// Messages this bot sent and must delete before the next draw.
    pub owned_messages: Vec<MessageId>,
    pub checkout: CheckoutStep,
    pub editor: EditorStep,
    /// Category the staff catalog view is currently showing.
    pub catalog_category: Option<String>,
}

impl Session {
    pub fn quantity(&self, product_id: &str) -> u32 {
        self.cart.get(product_id).copied().unwrap_or(0)
    }

    /// Increments the cart quantity and returns the new value.
    pub fn add_one(&mut self, product_id: &str) -> u32 {
        let qty = self.cart.entry(product_id.to_string()).or_insert(0);
        *qty += 1;
        *qty
    }

    /// Decrements the cart quantity, removing the key at zero.
    /// Decrementing an absent key is a no-op.
    pub fn remove_one(&mut self, product_id: &str) -> u32 {
        match self.cart.get_mut(product_id) {
            Some(qty) if *qty > 1 => {
                *qty -= 1;
                *qty
            }
            Some(_) => {
                self.cart.remove(product_id);
                0
            }
            None => 0,
        }
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }

    pub fn track(&mut self, message_id: MessageId) {
        self.owned_messages.push(message_id);
    }

    /// Drops any in-progress checkout, keeping the cart.
    pub fn reset_checkout(&mut self) {
        self.checkout = CheckoutStep::Idle;
    }
}

/// Shared map of chat id -> [`Session`].
///
/// One mutex guards the whole map: interactions are handled one at a
/// time per chat anyway, and holding the guard for the duration of a
/// handler is what makes each interaction a non-reentrant unit of work.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<ChatId, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store and returns a guard deref-ing to the chat's
    /// session, creating it with defaults if absent.
    pub async fn session(&self, chat_id: ChatId) -> SessionGuard {
        let mut guard = Arc::clone(&self.inner).lock_owned().await;
        guard.entry(chat_id).or_default();
        SessionGuard { guard, chat_id }
    }
}

/// Exclusive access to one chat's session for the duration of an
/// interaction.
pub struct SessionGuard {
    guard: OwnedMutexGuard<HashMap<ChatId, Session>>,
    chat_id: ChatId,
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        // Entry inserted in SessionStore::session while the lock is held.
        self.guard
            .get(&self.chat_id)
            .expect("session exists for the guarded chat")
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        self.guard
            .get_mut(&self.chat_id)
            .expect("session exists for the guarded chat")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_increment_and_decrement() {
        let mut session = Session::default();

        assert_eq!(session.add_one("p1"), 1);
        assert_eq!(session.add_one("p1"), 2);
        assert_eq!(session.quantity("p1"), 2);

        assert_eq!(session.remove_one("p1"), 1);
        assert_eq!(session.remove_one("p1"), 0);
        assert!(!session.cart.contains_key("p1"));

        // Decrementing an absent key stays a no-op.
        assert_eq!(session.remove_one("p1"), 0);
        assert!(session.cart.is_empty());
    }

    #[test]
    fn test_cart_never_holds_zero_quantities() {
        let mut session = Session::default();
        for _ in 0..3 {
            session.add_one("a");
        }
        session.add_one("b");
        for _ in 0..5 {
            session.remove_one("a");
        }
        session.remove_one("b");

        assert!(session.cart.values().all(|q| *q > 0));
        assert!(session.cart.is_empty());
    }

    #[test]
    fn test_checkout_step_defaults_to_idle() {
        let session = Session::default();
        assert!(!session.checkout.in_progress());
        assert!(matches!(session.editor, EditorStep::Idle));
    }

    #[test]
    fn test_reset_checkout_keeps_cart() {
        let mut session = Session::default();
        session.add_one("p1");
        session.checkout = CheckoutStep::AskName {
            prompt: MessageId(10),
        };

        session.reset_checkout();
        assert!(!session.checkout.in_progress());
        assert_eq!(session.quantity("p1"), 1);
    }

    #[tokio::test]
    async fn test_session_store_creates_defaults() {
        let store = SessionStore::new();
        {
            let mut session = store.session(ChatId(1)).await;
            assert!(session.cart.is_empty());
            session.add_one("p1");
        }
        let session = store.session(ChatId(1)).await;
        assert_eq!(session.quantity("p1"), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_per_chat() {
        let store = SessionStore::new();
        store.session(ChatId(1)).await.add_one("p1");
        let other = store.session(ChatId(2)).await;
        assert!(other.cart.is_empty());
    }

    #[test]
    fn test_step_state_serializes() {
        let step = CheckoutStep::WaitPhoto {
            prompt: Some(MessageId(5)),
            real_name: "Kim".to_string(),
            phone: "010".to_string(),
            kind: Fulfillment::Delivery,
            comment: "before noon".to_string(),
        };
        let json = serde_json::to_string(&step).expect("serialize");
        let back: CheckoutStep = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, step);
    }
}
