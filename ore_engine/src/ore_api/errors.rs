use thiserror::Error;

use crate::{
    db_types::{OrderId, PaymentMethod},
    payment_objects::ProviderKind,
    traits::{ProviderError, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Invalid checkout request: {0}")]
    Validation(String),
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Product {0} does not exist")]
    ProductNotFound(String),
    #[error("Not enough stock for {product_name} ({product_id}). Requested {requested}, only {available} available")]
    InsufficientStock { product_id: String, product_name: String, requested: i64, available: i64 },
    #[error("{0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} has no open payment session")]
    NoPaymentSession(OrderId),
    #[error("The payment session for order {order_id} was not opened with {provider}")]
    WrongProvider { order_id: OrderId, provider: ProviderKind },
    #[error("A payment session is already open for order {0}")]
    SessionAlreadyStarted(OrderId),
    #[error("Order {0} has already been paid")]
    AlreadyPaid(OrderId),
    #[error("Order {0} has been cancelled")]
    OrderCancelled(OrderId),
    #[error("The {provider} provider cannot take {method} payments")]
    UnsupportedPaymentMethod { provider: ProviderKind, method: PaymentMethod },
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error)]
pub enum OrderStatusError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Forbidden status change: {0}")]
    Forbidden(String),
    #[error("Order {0} kept changing while we tried to update it. Try again.")]
    ConcurrentModification(OrderId),
    #[error("{0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error)]
pub enum ShippingRateError {
    #[error("Invalid shipping rate: {0}")]
    Validation(String),
    #[error("{0}")]
    Store(#[from] StoreError),
}
