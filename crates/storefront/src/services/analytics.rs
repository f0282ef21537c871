//! Fire-and-forget event tracking.
//!
//! Events are written to the gateway's `analytics_events` table from a
//! spawned task. A tracking failure is logged and otherwise invisible;
//! nothing user-facing may ever wait on or fail because of analytics.

use tracing::warn;

use crate::gateway::{AnalyticsEvent, GatewayClient};

/// Handle for emitting analytics events.
///
/// Cheap to clone. A disabled sink (used in tests and when the gateway is
/// not configured) drops every event.
#[derive(Clone)]
pub struct AnalyticsSink {
    gateway: Option<GatewayClient>,
}

impl AnalyticsSink {
    #[must_use]
    pub fn new(gateway: GatewayClient) -> Self {
        Self {
            gateway: Some(gateway),
        }
    }

    /// A sink that drops all events.
    #[must_use]
    pub fn disabled() -> Self {
        Self { gateway: None }
    }

    /// Emit an event without waiting for the write.
    pub fn track(&self, event: AnalyticsEvent) {
        let Some(gateway) = self.gateway.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = gateway.insert_analytics_event(&event).await {
                warn!(event_name = %event.event_name, error = %e, "Failed to track analytics event");
            }
        });
    }
}
