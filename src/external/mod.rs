#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

//! Collaborator contracts consumed by the core: payment provider, document
//! generator, object storage and notifications. All are passed explicitly
//! into the operations that need them so tests can substitute fakes.

use crate::error::{FreightError, Result};
use crate::types::{Mission, UserId};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A marketplace participant as rendered on documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub id: UserId,
    pub name: String,
}

/// Checkout session handed back by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    pub session_id: String,
    pub checkout_url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Stable provider identifier stored on payment rows and matched
    /// against incoming events, e.g. `STRIPE`.
    fn name(&self) -> &'static str;

    /// Create a provider checkout session for the mission's final price.
    /// The provider must echo `mission.id` and the payer id back in its
    /// asynchronous events for reconciliation.
    async fn create_checkout_session(
        &self,
        mission: &Mission,
        payer: UserId,
    ) -> Result<ProviderSession>;
}

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Render the affreightment confirmation issued on carrier selection.
    async fn render_confirmation(
        &self,
        mission: &Mission,
        shipper: &Party,
        carrier: &Party,
    ) -> Result<String>;

    /// Render the CMR shipment document, embedding the pickup signature
    /// when one was uploaded.
    async fn render_cmr(
        &self,
        mission: &Mission,
        shipper: &Party,
        carrier: &Party,
        signature_url: Option<&str>,
    ) -> Result<String>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Public URL for a stored object.
    fn url(&self, path: &str) -> String;
}

/// Best-effort push notifications. Callers log and swallow failures; a
/// notifier error never blocks the triggering mutation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: UserId, message: &str) -> Result<()>;
}

/// An uploaded artifact (pickup photo, signature) supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Content-addressed storage path for an uploaded artifact, so duplicate
/// uploads land on the same object.
#[must_use]
pub fn artifact_path(prefix: &str, label: &str, upload: &Upload) -> String {
    let digest = Sha256::digest(&upload.bytes);
    let short = digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    format!("{prefix}/{label}_{short}_{}", upload.file_name)
}

/// Local-filesystem object storage. Production deployments swap in a real
/// blob store; this keeps the CLI and tests self-contained.
#[derive(Debug, Clone)]
pub struct FsObjectStorage {
    root: PathBuf,
    base_url: String,
}

impl FsObjectStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent().map(Path::to_path_buf) {
            tokio::fs::create_dir_all(&parent).await.map_err(|e| {
                FreightError::CollaboratorError(format!(
                    "Failed to create storage directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        tokio::fs::write(&target, bytes).await.map_err(|e| {
            FreightError::CollaboratorError(format!(
                "Failed to store object {}: {e}",
                target.display()
            ))
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
