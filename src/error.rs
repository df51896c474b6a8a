//! Request-level error taxonomy and its HTTP mapping.
//!
//! Every failure surfaced to a client carries a stable machine-readable
//! `error` label plus a human-readable `message`, in that order:
//! validation (400) → authentication (401) → authorization (403) →
//! lookup (404). Internal faults log their detail server-side and return
//! only a generic body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed, missing, or wrong-typed input. Rejected at the request
    /// boundary before any store is touched.
    #[error("{0}")]
    Validation(String),

    /// Unknown user or wrong password. The two cases are deliberately
    /// indistinguishable to avoid user enumeration.
    #[error("Usuário ou senha incorretos")]
    Credentials,

    /// No bearer token in the `Authorization` header.
    #[error("É necessário fornecer um token de autenticação no cabeçalho Authorization")]
    MissingToken,

    /// Malformed, tampered, or expired token. One outward signal for all
    /// three.
    #[error("O token fornecido é inválido ou expirou")]
    InvalidToken,

    /// Token subject does not own the target record.
    #[error("{0}")]
    Ownership(String),

    /// No consent record for the requested user.
    #[error("Não foi encontrada decisão de compartilhamento para este usuário")]
    RecordNotFound,

    /// Unmatched route.
    #[error("A rota {0} não existe")]
    RouteNotFound(String),

    /// Per-IP request budget exhausted.
    #[error("Limite de requisições excedido, tente novamente mais tarde")]
    RateLimited,

    /// Unexpected fault. The string is the caller-facing message; detail is
    /// logged at the fault site.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Credentials | Self::MissingToken | Self::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::Ownership(_) => StatusCode::FORBIDDEN,
            Self::RecordNotFound | Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label carried in the `error` field of the response body.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Dados inválidos",
            Self::Credentials => "Credenciais inválidas",
            Self::MissingToken => "Token não fornecido",
            Self::InvalidToken => "Token inválido",
            Self::Ownership(_) => "Acesso negado",
            Self::RecordNotFound => "Usuário não encontrado",
            Self::RouteNotFound(_) => "Rota não encontrada",
            Self::RateLimited => "Muitas requisições",
            Self::Internal(_) => "Erro interno do servidor",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.label(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
