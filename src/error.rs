use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::ProviderKind;
use crate::refresh::ConnectError;
use crate::store::StoreError;
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0} rejected the credential")]
    CredentialInvalid(ProviderKind),
    #[error("{0}")]
    ProviderUnavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn code(&self) -> i32 {
        match self {
            AppError::Validation(_) => error_codes::VALIDATION_ERROR,
            AppError::Unauthorized => error_codes::AUTH_FAILED,
            AppError::NotFound(_) => error_codes::NOT_FOUND,
            AppError::CredentialInvalid(_) => error_codes::CREDENTIAL_INVALID,
            AppError::ProviderUnavailable(_) => error_codes::PROVIDER_UNAVAILABLE,
            AppError::Store(_) => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CredentialInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ConnectError> for AppError {
    fn from(e: ConnectError) -> Self {
        match e {
            ConnectError::Rejected(provider) => AppError::CredentialInvalid(provider),
            e @ ConnectError::Unavailable { .. } => AppError::ProviderUnavailable(e.to_string()),
            ConnectError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 存储错误的细节只进日志
        let msg = match &self {
            AppError::Store(e) => {
                tracing::error!("Storage failure: {}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, error_to_api_response::<()>(self.code(), msg)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_errors_map_to_domain_codes() {
        let rejected: AppError = ConnectError::Rejected(ProviderKind::Seo).into();
        assert_eq!(rejected.code(), error_codes::CREDENTIAL_INVALID);
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let unavailable: AppError = ConnectError::Unavailable {
            provider: ProviderKind::Analytics,
            reason: "timed out".into(),
        }
        .into();
        assert_eq!(unavailable.code(), error_codes::PROVIDER_UNAVAILABLE);
        assert_eq!(unavailable.to_string(), "could not reach analytics: timed out");
    }

    #[test]
    fn storage_errors_are_internal() {
        let err: AppError = StoreError::Corrupt("bad row".into()).into();
        assert_eq!(err.code(), error_codes::INTERNAL_ERROR);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
