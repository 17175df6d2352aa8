//! Builder pattern for NewsletterEngine

use crate::config::EngineConfig;
use crate::engine::NewsletterEngine;
use crate::error::{Result, SdkError};
use mailcast_repository::FileSystemRepository;
use mailcast_runtime::{
    CampaignDispatcher, CampaignStore, DeliveryStore, MemberSnapshotProvider, MemoryBackend,
    MemoryCampaignStore, MemoryDeliveryStore, SuppressionBackend, SuppressionRegistry, Transport,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for NewsletterEngine
///
/// # Example
///
/// ```rust,ignore
/// use mailcast_sdk::NewsletterEngineBuilder;
///
/// // Segments, campaigns and members from a repository directory
/// let engine = NewsletterEngineBuilder::new()
///     .with_repository("repository")
///     .with_transport(transport)
///     .build()
///     .await?;
///
/// // Explicit collaborators (tests, embedding)
/// let engine = NewsletterEngineBuilder::new()
///     .with_member_provider(provider)
///     .with_transport(transport)
///     .build()
///     .await?;
/// ```
pub struct NewsletterEngineBuilder {
    config: EngineConfig,
    repository_path: Option<PathBuf>,
    campaigns: Option<Arc<dyn CampaignStore>>,
    deliveries: Option<Arc<dyn DeliveryStore>>,
    members: Option<Arc<dyn MemberSnapshotProvider>>,
    suppression_backend: Option<Arc<dyn SuppressionBackend>>,
    transport: Option<Arc<dyn Transport>>,
}

impl NewsletterEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::new(),
            repository_path: None,
            campaigns: None,
            deliveries: None,
            members: None,
            suppression_backend: None,
            transport: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load segments and campaigns from a repository directory and read
    /// member snapshots from it, unless a member provider is set explicitly
    pub fn with_repository(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository_path = Some(path.into());
        self
    }

    pub fn with_campaign_store(mut self, store: Arc<dyn CampaignStore>) -> Self {
        self.campaigns = Some(store);
        self
    }

    pub fn with_delivery_store(mut self, store: Arc<dyn DeliveryStore>) -> Self {
        self.deliveries = Some(store);
        self
    }

    pub fn with_member_provider(mut self, provider: Arc<dyn MemberSnapshotProvider>) -> Self {
        self.members = Some(provider);
        self
    }

    /// Persistence for the suppression registry; in-memory when unset
    pub fn with_suppression_backend(mut self, backend: Arc<dyn SuppressionBackend>) -> Self {
        self.suppression_backend = Some(backend);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the engine
    pub async fn build(self) -> Result<NewsletterEngine> {
        self.config.validate()?;

        let transport = self
            .transport
            .ok_or_else(|| SdkError::ConfigError("A transport is required".to_string()))?;

        let campaigns: Arc<dyn CampaignStore> = self
            .campaigns
            .unwrap_or_else(|| Arc::new(MemoryCampaignStore::new()));
        let deliveries: Arc<dyn DeliveryStore> = self
            .deliveries
            .unwrap_or_else(|| Arc::new(MemoryDeliveryStore::new()));

        let mut members = self.members;
        if let Some(path) = &self.repository_path {
            let repository = FileSystemRepository::new(path)?;
            let summary = repository.seed(campaigns.as_ref()).await?;
            tracing::info!(
                path = %repository.root().display(),
                segments = summary.segments,
                campaigns = summary.campaigns,
                "Loaded repository"
            );
            if members.is_none() {
                members = Some(Arc::new(repository));
            }
        }
        let members = members.ok_or_else(|| {
            SdkError::ConfigError("A member provider or repository is required".to_string())
        })?;

        let backend = self
            .suppression_backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let suppression = Arc::new(
            SuppressionRegistry::load(backend)
                .await?
                .with_soft_bounce_threshold(self.config.soft_bounce_threshold),
        );

        let dispatcher = CampaignDispatcher::new(
            campaigns.clone(),
            deliveries.clone(),
            members,
            suppression.clone(),
            transport,
        )
        .with_config(self.config.dispatcher_config());

        Ok(NewsletterEngine::new(
            self.config,
            campaigns,
            deliveries,
            suppression,
            dispatcher,
        ))
    }
}

impl Default for NewsletterEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
