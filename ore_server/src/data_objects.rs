use std::fmt::Display;

use ore_common::Money;
use ore_engine::{
    db_types::{Customer, NewShippingInfo, OrderStatusType, PaymentMethod, ShippingStatus},
    payment_objects::{EventOutcome, PaymentSession},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub email: String,
    pub shipping: NewShippingInfo,
    pub payment_method: PaymentMethod,
}

impl CheckoutRequest {
    pub fn customer(&self) -> Customer {
        Customer::new(self.customer_id.as_str(), self.email.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingStatusUpdate {
    pub status: ShippingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingQuoteParams {
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub city: String,
    pub fee: Money,
}

/// What the client gets back after opening a payment session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSessionResponse {
    pub order_id: String,
    #[serde(flatten)]
    pub session: PaymentSession,
}

/// The result of applying a payment signal, in a shape the storefront can poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub applied: bool,
    #[serde(flatten)]
    pub outcome: EventOutcome,
}

impl From<EventOutcome> for PaymentStatusResponse {
    fn from(outcome: EventOutcome) -> Self {
        Self { applied: outcome.is_applied(), outcome }
    }
}
