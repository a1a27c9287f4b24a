//! Configuração do curricula carregada a partir de `curricula.toml`.
//!
//! A struct [`CurriculaConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `CURRICULA_API_KEY` e `CURRICULA_BASE_URL` têm
//! precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::CurriculaError;
use crate::quota::{DEFAULT_QUOTA_MARKER, QuotaDetector};
use crate::service::client::DEFAULT_BASE_URL;
use crate::state_machine::RetryPolicy;

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "curricula.toml";

/// Configuração de nível superior carregada de `curricula.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurriculaConfig {
    /// Token de acesso ao serviço de estúdio.
    #[serde(default)]
    pub api_key: String,

    /// URL raiz do serviço.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sequência de atrasos, em segundos, entre retentativas.
    /// O tamanho da lista é o número máximo de retentativas.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<u64>,

    /// Quantas consultas de status antes de declarar um job incompleto.
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Intervalo entre consultas de status, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Gera também os artefatos de resumo do tópico.
    #[serde(default = "default_include_summary")]
    pub include_summary: bool,

    /// Trechos de texto que identificam esgotamento da cota diária.
    #[serde(default = "default_quota_markers")]
    pub quota_markers: Vec<String>,

    /// Timeout por requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// 30s, 60s, 120s.
fn default_backoff_secs() -> Vec<u64> {
    vec![30, 60, 120]
}

fn default_poll_attempts() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_include_summary() -> bool {
    true
}

fn default_quota_markers() -> Vec<String> {
    vec![DEFAULT_QUOTA_MARKER.to_string()]
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for CurriculaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            backoff_secs: default_backoff_secs(),
            poll_attempts: default_poll_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            include_summary: default_include_summary(),
            quota_markers: default_quota_markers(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CurriculaConfig {
    /// Carrega a configuração de `curricula.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, CurriculaError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito, aplicando as
    /// variáveis de ambiente e validando o resultado.
    pub fn load_from(path: &Path) -> Result<Self, CurriculaError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<CurriculaConfig>(&contents)?
        } else {
            Self::default()
        };

        if let Ok(key) = std::env::var("CURRICULA_API_KEY") {
            if !key.is_empty() {
                config.api_key = key;
            }
        }
        if let Ok(url) = std::env::var("CURRICULA_BASE_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CurriculaError> {
        if self.backoff_secs.is_empty() {
            return Err(CurriculaError::Config("backoff_secs must not be empty".into()));
        }
        if self.poll_attempts == 0 {
            return Err(CurriculaError::Config("poll_attempts must be at least 1".into()));
        }
        if self.quota_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(CurriculaError::Config("quota_markers must name at least one marker".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(&self.backoff_secs)
    }

    pub fn quota_detector(&self) -> QuotaDetector {
        QuotaDetector::new(&self.quota_markers)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
