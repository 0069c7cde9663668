use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use ore_engine::{
    traits::{ProviderError, StoreError},
    CheckoutError,
    OrderStatusError,
    PaymentFlowError,
    ShippingRateError,
};
use payment_providers::ProviderApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    InsufficientStock(String),
    #[error("The request conflicts with the current state of the order. {0}")]
    Conflict(String),
    #[error("Payment provider error. {0}")]
    PaymentProviderError(String),
    #[error("Invalid webhook. {0}")]
    InvalidWebhook(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock(_) => StatusCode::CONFLICT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentProviderError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            error!("💻️ {self}");
        }
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(_) | StoreError::ProductNotFound(_) => Self::NoRecordFound(e.to_string()),
            StoreError::Conflict(_) => Self::Conflict(e.to_string()),
            StoreError::DatabaseError(_) | StoreError::InvalidData(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Validation(_) | CheckoutError::EmptyCart => Self::ValidationError(e.to_string()),
            CheckoutError::ProductNotFound(_) => Self::NoRecordFound(e.to_string()),
            CheckoutError::InsufficientStock { .. } => Self::InsufficientStock(e.to_string()),
            CheckoutError::Store(e) => e.into(),
        }
    }
}

impl From<ProviderError> for ServerError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::InvalidSignature(_) | ProviderError::MalformedResponse(_) => {
                Self::InvalidWebhook(e.to_string())
            },
            _ => Self::PaymentProviderError(e.to_string()),
        }
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentFlowError::UnsupportedPaymentMethod { .. } => Self::ValidationError(e.to_string()),
            PaymentFlowError::NoPaymentSession(_)
            | PaymentFlowError::WrongProvider { .. }
            | PaymentFlowError::SessionAlreadyStarted(_)
            | PaymentFlowError::AlreadyPaid(_)
            | PaymentFlowError::OrderCancelled(_) => Self::Conflict(e.to_string()),
            // Status queries fail with a gateway error. Only inbound webhooks get a 400 for bad payloads.
            PaymentFlowError::Provider(e) => Self::PaymentProviderError(e.to_string()),
            PaymentFlowError::Store(e) => e.into(),
        }
    }
}

impl From<OrderStatusError> for ServerError {
    fn from(e: OrderStatusError) -> Self {
        match e {
            OrderStatusError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderStatusError::Forbidden(_) | OrderStatusError::ConcurrentModification(_) => {
                Self::Conflict(e.to_string())
            },
            OrderStatusError::Store(e) => e.into(),
        }
    }
}

impl From<ShippingRateError> for ServerError {
    fn from(e: ShippingRateError) -> Self {
        match e {
            ShippingRateError::Validation(_) => Self::ValidationError(e.to_string()),
            ShippingRateError::Store(e) => e.into(),
        }
    }
}

impl From<ProviderApiError> for ServerError {
    fn from(e: ProviderApiError) -> Self {
        Self::InitializeError(e.to_string())
    }
}
