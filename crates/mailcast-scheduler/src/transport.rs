//! Transport used when no mail provider is wired in

use async_trait::async_trait;
use mailcast_runtime::{DeliveryFault, OutboundMessage, Transport};

/// Logs every message instead of delivering it
#[derive(Debug, Default, Clone)]
pub struct LoggingTransport;

#[async_trait]
impl Transport for LoggingTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryFault> {
        tracing::info!(
            campaign_id = message.campaign_id,
            email = %message.email,
            subject = %message.subject,
            variant = ?message.variant,
            "Message sent"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}
