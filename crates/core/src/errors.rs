use thiserror::Error;

use crate::domain::customer::CustomerId;
use crate::domain::product::ProductId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown {kind} label `{value}`")]
    UnknownLabel { kind: &'static str, value: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure reported by an order, product or customer store. The backend error is kept as the
/// source and its message is surfaced as-is.
#[derive(Debug, Error)]
#[error("store failure: {message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self { message: error.to_string(), source: Some(Box::new(error)) }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("customer not found: {0}")]
    CustomerNotFound(CustomerId),
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),
    #[error("recommendation limit must be greater than zero")]
    InvalidLimit,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("customer not found: {0}")]
    CustomerNotFound(CustomerId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<RecommendationError> for ApplicationError {
    fn from(value: RecommendationError) -> Self {
        match value {
            RecommendationError::CustomerNotFound(id) => Self::NotFound(format!("customer {id}")),
            RecommendationError::ProductNotFound(id) => Self::NotFound(format!("product {id}")),
            RecommendationError::InvalidLimit => Self::Domain(DomainError::InvariantViolation(
                "recommendation limit must be greater than zero".to_owned(),
            )),
            RecommendationError::Store(error) => Self::Persistence(error.detail().to_owned()),
        }
    }
}

impl From<MetricsError> for ApplicationError {
    fn from(value: MetricsError) -> Self {
        match value {
            MetricsError::CustomerNotFound(id) => Self::NotFound(format!("customer {id}")),
            MetricsError::Store(error) => Self::Persistence(error.detail().to_owned()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested customer or product does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::NotFound { .. } => "not_found",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::NotFound(message) => {
                Self::NotFound { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
