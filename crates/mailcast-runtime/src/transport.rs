//! Transport boundary
//!
//! The engine hands each rendered message to a [`Transport`]; rendering
//! templates and speaking SMTP happen on the far side.

use async_trait::async_trait;
use mailcast_core::{CampaignId, MemberId, Variant};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::Mutex;

/// One message for one recipient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub campaign_id: CampaignId,
    pub subject: String,
    pub content: String,
    pub email: String,
    pub member_id: Option<MemberId>,
    pub variant: Option<Variant>,
}

/// The transport refused or failed to deliver a single message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFault {
    #[error("Recipient rejected: {0}")]
    Rejected(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryFault>;

    fn name(&self) -> &str;
}

/// Transport that records every message and rejects a configured set of
/// addresses
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    reject: HashSet<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject these addresses with [`DeliveryFault::Rejected`]
    pub fn rejecting<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reject = emails
            .into_iter()
            .map(|e| e.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Messages accepted so far
    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryFault> {
        if self.reject.contains(&message.email.to_lowercase()) {
            return Err(DeliveryFault::Rejected(message.email.clone()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(email: &str) -> OutboundMessage {
        OutboundMessage {
            campaign_id: 1,
            subject: "Hello".to_string(),
            content: "<p>Hi</p>".to_string(),
            email: email.to_string(),
            member_id: None,
            variant: None,
        }
    }

    #[tokio::test]
    async fn test_mock_transport_records_and_rejects() {
        let transport = MockTransport::new().rejecting(["Bad@x.ie"]);
        assert!(transport.send(&message("good@x.ie")).await.is_ok());
        let err = transport.send(&message("bad@x.ie")).await.unwrap_err();
        assert_eq!(err, DeliveryFault::Rejected("bad@x.ie".to_string()));
        assert_eq!(transport.sent().await.len(), 1);
    }
}
