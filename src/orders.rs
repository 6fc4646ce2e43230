//! Order lifecycle: creation with a cart snapshot, payment submission,
//! the staff approve/reject transition and the owner dashboard scan.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{BuyerProfile, Fulfillment, Order, OrderStatus, Product};
use crate::store::{OrderField, ShopStore};

/// Line-item summary and total frozen at order-creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub items: String,
    pub total: i64,
}

/// Resolves the cart against the current catalog. Unknown product ids
/// are skipped; later price or cart changes do not touch the snapshot.
pub fn snapshot_cart(cart: &BTreeMap<String, u32>, products: &[Product]) -> CartSnapshot {
    let mut items = Vec::with_capacity(cart.len());
    let mut total = 0;
    for (pid, qty) in cart {
        let Some(p) = products.iter().find(|p| p.product_id == *pid) else {
            continue;
        };
        items.push(format!("{} x{}", p.name, qty));
        total += p.price * i64::from(*qty);
    }
    CartSnapshot {
        items: items.join("; "),
        total,
    }
}

/// Appends a new order in `waiting_payment` status and returns its id.
pub fn create_order(
    store: &dyn ShopStore,
    buyer: &BuyerProfile,
    cart: &BTreeMap<String, u32>,
    kind: Fulfillment,
    comment: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let snapshot = snapshot_cart(cart, &store.list_products()?);
    let order = Order {
        order_id: Uuid::new_v4().to_string(),
        created_at: now.to_rfc3339(),
        buyer_chat_id: buyer.chat_id,
        buyer_username: buyer.username.clone(),
        items: snapshot.items,
        total: snapshot.total,
        fulfillment: kind.label().to_string(),
        comment: comment.to_string(),
        payment_proof: String::new(),
        status: OrderStatus::WaitingPayment,
        handled_at: String::new(),
        handled_by: String::new(),
        reaction_seconds: None,
    };
    store.append_order(&order)?;
    info!(order_id = %order.order_id, buyer = buyer.chat_id, total = order.total, "Order created");
    Ok(order.order_id)
}

/// Attaches the payment proof and flips the order to `pending`,
/// making it visible to staff decisions.
pub fn submit_payment(store: &dyn ShopStore, order_id: &str, payment_photo: &str) -> Result<bool> {
    store.update_order_fields(
        order_id,
        &[
            (OrderField::PaymentProof, payment_photo.to_string()),
            (OrderField::Status, OrderStatus::Pending.as_str().to_string()),
        ],
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl DecisionAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(DecisionAction::Approve),
            "reject" => Some(DecisionAction::Reject),
            _ => None,
        }
    }

    fn status(self) -> OrderStatus {
        match self {
            DecisionAction::Approve => OrderStatus::Approved,
            DecisionAction::Reject => OrderStatus::Rejected,
        }
    }
}

/// Outcome of a staff decision, reported back to the acting staff
/// member. Stale decisions are results, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    Applied {
        buyer_chat_id: i64,
        status: OrderStatus,
    },
    /// Another staff member got there first (or the order never
    /// reached `pending`).
    AlreadyHandled { status: OrderStatus },
    NotFound,
}

/// Applies a staff decision with an optimistic precondition: the order
/// must still be `pending` when read.
///
/// This is read-then-write, not a transaction. Two decisions racing
/// within the read/write window can both observe `pending`; that
/// window is accepted. Staff actions on one order arrive seconds
/// apart, and the later actor is told the order was already handled.
pub fn decide(
    store: &dyn ShopStore,
    order_id: &str,
    staff_chat_id: i64,
    action: DecisionAction,
    now: DateTime<Utc>,
) -> Result<DecisionOutcome> {
    let Some(order) = store.order_by_id(order_id)? else {
        warn!(order_id, "Decision on unknown order");
        return Ok(DecisionOutcome::NotFound);
    };

    if order.status != OrderStatus::Pending {
        info!(order_id, status = %order.status, "Order already handled, decision ignored");
        return Ok(DecisionOutcome::AlreadyHandled {
            status: order.status,
        });
    }

    let new_status = action.status();
    // A malformed created_at leaves the metric unset rather than
    // failing the decision.
    let reaction_seconds = DateTime::parse_from_rfc3339(&order.created_at)
        .ok()
        .map(|created| (now - created.with_timezone(&Utc)).num_seconds().max(0));

    let mut updates = vec![
        (OrderField::Status, new_status.as_str().to_string()),
        (OrderField::HandledAt, now.to_rfc3339()),
        (OrderField::HandledBy, staff_chat_id.to_string()),
    ];
    if let Some(secs) = reaction_seconds {
        updates.push((OrderField::ReactionSeconds, secs.to_string()));
    }
    store.update_order_fields(order_id, &updates)?;

    info!(
        order_id,
        staff = staff_chat_id,
        status = %new_status,
        reaction_seconds = ?reaction_seconds,
        "Order decided"
    );
    Ok(DecisionOutcome::Applied {
        buyer_chat_id: order.buyer_chat_id,
        status: new_status,
    })
}

/// Read-only aggregation for the owner dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    pub revenue_today: i64,
    pub revenue_week: i64,
    pub revenue_month: i64,
    pub pending: u32,
    pub approved: u32,
    pub rejected: u32,
    pub avg_reaction_secs: Option<f64>,
}

/// Scans the order collection. Rows with unparseable timestamps are
/// skipped from the revenue windows but still counted by status.
pub fn dashboard_stats(orders: &[Order], now: DateTime<Utc>) -> DashboardStats {
    let today = now.date_naive();
    let week_ago = now - Duration::days(7);
    let month_ago = now - Duration::days(30);

    let mut stats = DashboardStats::default();
    let mut reaction_times: Vec<i64> = Vec::new();

    for order in orders {
        match order.status {
            OrderStatus::Pending => stats.pending += 1,
            OrderStatus::Approved => stats.approved += 1,
            OrderStatus::Rejected => stats.rejected += 1,
            OrderStatus::WaitingPayment => {}
        }

        if let Ok(created) = DateTime::parse_from_rfc3339(&order.created_at) {
            let created = created.with_timezone(&Utc);
            if created.date_naive() == today {
                stats.revenue_today += order.total;
            }
            if created >= week_ago {
                stats.revenue_week += order.total;
            }
            if created >= month_ago {
                stats.revenue_month += order.total;
            }
        }

        if let Some(secs) = order.reaction_seconds {
            reaction_times.push(secs);
        }
    }

    if !reaction_times.is_empty() {
        let sum: i64 = reaction_times.iter().sum();
        stats.avg_reaction_secs = Some(sum as f64 / reaction_times.len() as f64);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use chrono::TimeZone;

    fn product(id: &str, name: &str, price: i64) -> Product {
        Product {
            product_id: id.to_string(),
            name: name.to_string(),
            price,
            available: true,
            category: "Bouquets".to_string(),
            photo_file_id: None,
            description: None,
        }
    }

    fn buyer() -> BuyerProfile {
        BuyerProfile {
            chat_id: 42,
            username: "buyer".to_string(),
            full_name: "Buyer".to_string(),
        }
    }

    fn seeded_store() -> MemStore {
        let store = MemStore::new();
        store.insert_product(product("A", "Rose bouquet", 15000));
        store.insert_product(product("B", "Tulip", 8000));
        store
    }

    fn cart_ab() -> BTreeMap<String, u32> {
        let mut cart = BTreeMap::new();
        cart.insert("A".to_string(), 2);
        cart.insert("B".to_string(), 1);
        cart
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_snapshot_totals() {
        let store = seeded_store();
        let snapshot = snapshot_cart(&cart_ab(), &store.list_products().unwrap());
        assert_eq!(snapshot.total, 38000);
        assert_eq!(snapshot.items, "Rose bouquet x2; Tulip x1");
    }

    #[test]
    fn test_order_snapshot_survives_cart_and_price_changes() -> Result<()> {
        let store = seeded_store();
        let mut cart = cart_ab();
        let id = create_order(&store, &buyer(), &cart, Fulfillment::Pickup, "-", t0())?;

        // Mutate the cart and the catalog after creation.
        cart.clear();
        store.update_product_field("A", crate::store::ProductField::Price, "99000")?;

        let order = store.order_by_id(&id)?.expect("order exists");
        assert_eq!(order.total, 38000);
        assert_eq!(order.items, "Rose bouquet x2; Tulip x1");
        assert_eq!(order.status, OrderStatus::WaitingPayment);
        Ok(())
    }

    #[test]
    fn test_submit_payment_moves_to_pending() -> Result<()> {
        let store = seeded_store();
        let id = create_order(&store, &buyer(), &cart_ab(), Fulfillment::Delivery, "", t0())?;

        assert!(submit_payment(&store, &id, "photo-1")?);
        let order = store.order_by_id(&id)?.expect("order exists");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_proof, "photo-1");
        Ok(())
    }

    #[test]
    fn test_decide_first_wins_second_rejected() -> Result<()> {
        let store = seeded_store();
        let id = create_order(&store, &buyer(), &cart_ab(), Fulfillment::Pickup, "", t0())?;
        submit_payment(&store, &id, "photo")?;

        let first = decide(&store, &id, 100, DecisionAction::Approve, t0())?;
        assert_eq!(
            first,
            DecisionOutcome::Applied {
                buyer_chat_id: 42,
                status: OrderStatus::Approved,
            }
        );

        // A different staff member racing with the opposite action.
        let second = decide(&store, &id, 200, DecisionAction::Reject, t0())?;
        assert_eq!(
            second,
            DecisionOutcome::AlreadyHandled {
                status: OrderStatus::Approved,
            }
        );

        let order = store.order_by_id(&id)?.expect("order exists");
        assert_eq!(order.status, OrderStatus::Approved);
        assert_eq!(order.handled_by, "100");
        Ok(())
    }

    #[test]
    fn test_decide_requires_pending() -> Result<()> {
        let store = seeded_store();
        let id = create_order(&store, &buyer(), &cart_ab(), Fulfillment::Pickup, "", t0())?;

        // Still waiting_payment: not staff-visible yet.
        let outcome = decide(&store, &id, 100, DecisionAction::Approve, t0())?;
        assert_eq!(
            outcome,
            DecisionOutcome::AlreadyHandled {
                status: OrderStatus::WaitingPayment,
            }
        );
        Ok(())
    }

    #[test]
    fn test_decide_records_reaction_seconds() -> Result<()> {
        let store = seeded_store();
        let id = create_order(&store, &buyer(), &cart_ab(), Fulfillment::Pickup, "", t0())?;
        submit_payment(&store, &id, "photo")?;

        let handled_at = t0() + Duration::seconds(95);
        decide(&store, &id, 100, DecisionAction::Approve, handled_at)?;

        let order = store.order_by_id(&id)?.expect("order exists");
        assert_eq!(order.reaction_seconds, Some(95));
        assert_eq!(order.handled_at, handled_at.to_rfc3339());
        Ok(())
    }

    #[test]
    fn test_decide_tolerates_bad_created_at() -> Result<()> {
        let store = seeded_store();
        let order = Order {
            order_id: "bad-ts".to_string(),
            created_at: "not a timestamp".to_string(),
            buyer_chat_id: 42,
            buyer_username: String::new(),
            items: "Rose x1".to_string(),
            total: 15000,
            fulfillment: "Pickup".to_string(),
            comment: String::new(),
            payment_proof: "photo".to_string(),
            status: OrderStatus::Pending,
            handled_at: String::new(),
            handled_by: String::new(),
            reaction_seconds: None,
        };
        store.append_order(&order)?;

        let outcome = decide(&store, "bad-ts", 100, DecisionAction::Reject, t0())?;
        assert!(matches!(outcome, DecisionOutcome::Applied { .. }));

        let stored = store.order_by_id("bad-ts")?.expect("order exists");
        assert_eq!(stored.reaction_seconds, None);
        assert_eq!(stored.status, OrderStatus::Rejected);
        Ok(())
    }

    #[test]
    fn test_decide_unknown_order() -> Result<()> {
        let store = seeded_store();
        let outcome = decide(&store, "missing", 1, DecisionAction::Approve, t0())?;
        assert_eq!(outcome, DecisionOutcome::NotFound);
        Ok(())
    }

    #[test]
    fn test_dashboard_windows_and_averages() {
        let now = t0();
        let mk = |created: DateTime<Utc>, total: i64, status: OrderStatus, reaction: Option<i64>| {
            Order {
                order_id: Uuid::new_v4().to_string(),
                created_at: created.to_rfc3339(),
                buyer_chat_id: 1,
                buyer_username: String::new(),
                items: String::new(),
                total,
                fulfillment: "Pickup".to_string(),
                comment: String::new(),
                payment_proof: String::new(),
                status,
                handled_at: String::new(),
                handled_by: String::new(),
                reaction_seconds: reaction,
            }
        };

        let orders = vec![
            mk(now - Duration::hours(2), 10000, OrderStatus::Approved, Some(60)),
            mk(now - Duration::days(3), 20000, OrderStatus::Pending, None),
            mk(now - Duration::days(20), 40000, OrderStatus::Rejected, Some(180)),
            mk(now - Duration::days(40), 80000, OrderStatus::Approved, None),
        ];

        let stats = dashboard_stats(&orders, now);
        assert_eq!(stats.revenue_today, 10000);
        assert_eq!(stats.revenue_week, 30000);
        assert_eq!(stats.revenue_month, 70000);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.avg_reaction_secs, Some(120.0));
    }
}
