use std::sync::Arc;

use serde_json::Value;

use crate::cluster::FanOut;
use crate::hub::registry::{Registry, Scope};
use crate::hub::Event;

/// Publishing facade handed to business collaborators. Cheap to clone, knows
/// nothing about transports, and never reports delivery failure back to the
/// caller: a missed notification must not fail the state change that caused
/// it. Callers fire after their change commits and move on.
#[derive(Clone)]
pub struct Notifier {
    registry: Arc<Registry>,
    fan_out: Arc<dyn FanOut>,
}

impl Notifier {
    pub(crate) fn new(registry: Arc<Registry>, fan_out: Arc<dyn FanOut>) -> Self {
        Self { registry, fan_out }
    }

    /// Deliver an event to every connected session of one user. Zero connected
    /// sessions is a silent no-op.
    pub async fn notify(&self, user_id: &str, event_type: &str, payload: Value) {
        self.publish(Scope::User(user_id.to_string()), Event::new(event_type, payload))
            .await;
    }

    /// Deliver an event to every session connected right now.
    pub async fn broadcast(&self, event_type: &str, payload: Value) {
        self.publish(Scope::All, Event::new(event_type, payload)).await;
    }

    async fn publish(&self, scope: Scope, event: Event) {
        match &scope {
            Scope::User(user_id) => {
                self.registry.notify(user_id, &event).await;
            }
            Scope::All => {
                self.registry.broadcast(&event).await;
            }
        }
        // Local delivery first, then the cluster channel; other processes
        // (and this one) re-inject on receipt.
        self.fan_out.publish(&scope, &event).await;
    }

    pub async fn send_order_update(&self, customer_id: &str, order_id: &str, status: &str) {
        self.publish(
            Scope::User(customer_id.to_string()),
            Event::order_update(order_id, status),
        )
        .await;
    }

    pub async fn send_booking_confirmation(&self, customer_id: &str, booking_id: &str) {
        self.publish(
            Scope::User(customer_id.to_string()),
            Event::booking_confirmed(booking_id),
        )
        .await;
    }

    pub async fn send_booking_update(&self, customer_id: &str, booking_id: &str, status: &str) {
        self.publish(
            Scope::User(customer_id.to_string()),
            Event::booking_update(booking_id, status),
        )
        .await;
    }

    pub async fn announce_new_order(&self, restaurant_user_id: &str, order: Value) {
        self.publish(
            Scope::User(restaurant_user_id.to_string()),
            Event::new_order(order),
        )
        .await;
    }

    pub async fn announce_new_booking(&self, restaurant_user_id: &str, booking: Value) {
        self.publish(
            Scope::User(restaurant_user_id.to_string()),
            Event::new_booking(booking),
        )
        .await;
    }

    pub async fn announce_low_stock(&self, restaurant_user_id: &str, item: Value) {
        self.publish(
            Scope::User(restaurant_user_id.to_string()),
            Event::low_stock_alert(item),
        )
        .await;
    }

    pub async fn announce_new_deal(&self, deal: Value) {
        self.publish(Scope::All, Event::new_deal(deal)).await;
    }
}
