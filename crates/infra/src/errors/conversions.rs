//! Conversions from external infrastructure errors into domain errors.

use erpsync_domain::ErpSyncError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ErpSyncError);

impl From<InfraError> for ErpSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ErpSyncError> for InfraError {
    fn from(value: ErpSyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoErpSyncError {
    fn into_erpsync(self) -> ErpSyncError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ErpSyncError */
/* -------------------------------------------------------------------------- */

impl IntoErpSyncError for HttpError {
    fn into_erpsync(self) -> ErpSyncError {
        if self.is_timeout() {
            return ErpSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ErpSyncError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return ErpSyncError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => ErpSyncError::Auth(message),
                404 => ErpSyncError::NotFound(message),
                400..=499 => ErpSyncError::InvalidInput(message),
                _ => ErpSyncError::Network(message),
            };
        }

        ErpSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_erpsync())
    }
}

/* -------------------------------------------------------------------------- */
/* config parsing → ErpSyncError */
/* -------------------------------------------------------------------------- */

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(ErpSyncError::Config(format!("Invalid TOML format: {value}")))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(ErpSyncError::Config(format!("Failed to read config file: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
