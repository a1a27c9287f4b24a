//! Tipos de erro para os serviços externos de consulta e geração.
//!
//! Define [`ServiceError`] com variantes para rate limiting, erros da API
//! e erros de rede. O texto de `Display` sempre inclui a mensagem devolvida
//! pelo servidor, que é o que o detector de cota inspeciona.

use thiserror::Error;

/// Erros que podem ocorrer ao chamar o serviço de geração ou de consulta.
///
/// - [`RateLimited`](ServiceError::RateLimited) — o servidor retornou HTTP 429
/// - [`ApiError`](ServiceError::ApiError) — qualquer outro erro HTTP (4xx/5xx)
/// - [`NetworkError`](ServiceError::NetworkError) — falha na camada de rede
#[derive(Debug, Error)]
pub enum ServiceError {
    /// O servidor retornou HTTP 429.
    #[error("rate limited, retry after {retry_after_ms}ms: {message}")]
    RateLimited { retry_after_ms: u64, message: String },

    /// Erro retornado pela API, com o código HTTP e o corpo da resposta.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, corpo inválido).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = ServiceError::RateLimited {
            retry_after_ms: 5000,
            message: "slow down".into(),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms: slow down");
    }

    #[test]
    fn api_error_display_keeps_server_text() {
        let err = ServiceError::ApiError {
            status: 400,
            message: "Daily limit reached. Try again later.".into(),
        };
        assert_eq!(
            err.to_string(),
            "API error (status 400): Daily limit reached. Try again later."
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServiceError>();
    }
}
