//! Tipos de dados para requisições e respostas do serviço de estúdio.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato esperado pelos endpoints `notebooks/{id}/...`.

use serde::{Deserialize, Serialize};

/// Corpo da requisição de consulta em linguagem natural a um notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
}

/// Resposta de texto livre do serviço de consulta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
}

/// Corpo da requisição de criação de um artefato.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArtifactRequest {
    /// Mídia no vocabulário do serviço (ex.: "video", "infographic").
    pub kind: String,
    /// Rótulo de foco que orienta a geração.
    pub focus: String,
}

/// Resposta de criação: o identificador do artefato aceito.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArtifactResponse {
    pub artifact_id: String,
}

/// Estado de geração de um artefato no servidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Pending,
    Complete,
    Failed,
}

/// Uma linha da listagem de artefatos de um notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub id: String,
    pub status: ArtifactStatus,
    /// Título atual; o serviço pode omiti-lo.
    #[serde(default)]
    pub title: Option<String>,
}

/// Resposta da listagem de artefatos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactListResponse {
    #[serde(default)]
    pub artifacts: Vec<ArtifactSummary>,
}

/// Corpo da requisição de renomeação.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_list_deserialize_from_api_format() {
        let api_json = r#"{
            "artifacts": [
                {"id": "a1", "status": "complete", "title": "Intro"},
                {"id": "a2", "status": "pending"},
                {"id": "a3", "status": "failed", "title": null}
            ]
        }"#;
        let resp: ArtifactListResponse = serde_json::from_str(api_json).unwrap();
        assert_eq!(resp.artifacts.len(), 3);
        assert_eq!(resp.artifacts[0].status, ArtifactStatus::Complete);
        assert_eq!(resp.artifacts[1].title, None);
        assert_eq!(resp.artifacts[2].status, ArtifactStatus::Failed);
    }

    #[test]
    fn empty_artifact_list_defaults() {
        let resp: ArtifactListResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.artifacts.is_empty());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = serde_json::from_str::<ArtifactSummary>(r#"{"id": "a", "status": "queued"}"#);
        assert!(result.is_err());
    }
}
