//! Server-sent-events framing of the live update stream.
//!
//! Each registry event becomes one `data: <json>\n\n` frame. Idle periods
//! produce comment-only keep-alive frames, which browsers ignore but which
//! keep proxies from closing the connection.

use viewer_core::{Delivery, ShowEvent, Subscription};

use crate::error::BridgeError;
use crate::messages::WireEvent;

pub const KEEPALIVE_FRAME: &str = ": keepalive\n\n";
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Frame one event.
pub fn event_frame(event: &ShowEvent) -> Result<String, BridgeError> {
    let json = serde_json::to_string(&WireEvent::from(event)).map_err(|e| BridgeError::Encode {
        reason: e.to_string(),
    })?;
    Ok(format!("data: {json}\n\n"))
}

/// Frame a delivery, or `None` once the stream has ended.
pub fn delivery_frame(delivery: &Delivery) -> Option<Result<String, BridgeError>> {
    match delivery {
        Delivery::Event(event) => Some(event_frame(event)),
        Delivery::KeepAlive => Some(Ok(KEEPALIVE_FRAME.to_string())),
        Delivery::Cancelled | Delivery::Closed => None,
    }
}

/// Parse a `data:` frame back into its event, for clients and tests.
pub fn parse_frame(frame: &str) -> Option<WireEvent> {
    let json = frame.strip_prefix("data: ")?.trim_end();
    serde_json::from_str(json).ok()
}

/// Iterator of ready-to-write frames over a subscription.
///
/// Ends when the subscription is cancelled or the viewer shuts down.
/// Dropping the stream cancels the subscription.
pub struct EventStream {
    subscription: Subscription,
}

impl EventStream {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Iterator for EventStream {
    type Item = Result<String, BridgeError>;

    fn next(&mut self) -> Option<Self::Item> {
        delivery_frame(&self.subscription.recv())
    }
}
