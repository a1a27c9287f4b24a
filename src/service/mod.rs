pub mod client;
pub mod error;
pub mod types;

use std::collections::HashMap;

pub use client::StudioClient;
pub use error::ServiceError;
pub use types::ArtifactStatus;

use crate::state_machine::ArtifactKind;

/// Natural-language query against a notebook's sources.
pub trait QueryService {
    async fn query(&self, target_id: &str, prompt: &str) -> Result<String, ServiceError>;
}

/// Artifact creation, status and renaming. Every call may fail transiently.
pub trait GenerationService {
    /// Submit a generation request; returns the service's artifact id.
    async fn create(
        &self,
        target_id: &str,
        kind: ArtifactKind,
        focus_label: &str,
    ) -> Result<String, ServiceError>;

    /// Generation status of every artifact in the notebook, keyed by id.
    async fn status_of(&self, target_id: &str) -> Result<HashMap<String, ArtifactStatus>, ServiceError>;

    async fn rename(&self, artifact_id: &str, new_title: &str) -> Result<(), ServiceError>;
}
