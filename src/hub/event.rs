use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Outbound envelope pushed to clients: `{"type": ..., "payload": ...}`.
///
/// The hub never inspects the payload; event schemas belong to the business
/// modules that publish them. An event is immutable once constructed and is
/// serialized once per dispatch, with the resulting frame shared across every
/// recipient mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Serialize into the wire frame shared by all recipients of one dispatch.
    pub fn to_frame(&self) -> Result<Arc<str>, AppError> {
        let text = serde_json::to_string(self)?;
        Ok(Arc::from(text))
    }

    pub fn order_update(order_id: &str, status: &str) -> Self {
        Self::new(
            "order_update",
            json!({ "order_id": order_id, "status": status }),
        )
    }

    pub fn booking_confirmed(booking_id: &str) -> Self {
        Self::new("booking_confirmed", json!({ "booking_id": booking_id }))
    }

    pub fn booking_update(booking_id: &str, status: &str) -> Self {
        Self::new(
            "booking_update",
            json!({ "booking_id": booking_id, "status": status }),
        )
    }

    pub fn new_order(order: Value) -> Self {
        Self::new("new_order", order)
    }

    pub fn new_booking(booking: Value) -> Self {
        Self::new("new_booking", booking)
    }

    pub fn new_deal(deal: Value) -> Self {
        Self::new("new_deal", deal)
    }

    pub fn low_stock_alert(item: Value) -> Self {
        Self::new("low_stock_alert", item)
    }
}
