use std::fmt::Display;

use ore_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::db_types::{Order, OrderId};

/// The provider that opened a payment session. Stored with the session so that only that provider can settle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Sandbox,
    MoMo,
    Stripe,
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Sandbox => write!(f, "sandbox"),
            ProviderKind::MoMo => write!(f, "momo"),
            ProviderKind::Stripe => write!(f, "stripe"),
        }
    }
}

/// The normalised payment state reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentEventStatus {
    Successful,
    Failed,
    /// Not terminal. Nothing changes on the order.
    Pending,
}

impl Display for PaymentEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentEventStatus::Successful => write!(f, "SUCCESSFUL"),
            PaymentEventStatus::Failed => write!(f, "FAILED"),
            PaymentEventStatus::Pending => write!(f, "PENDING"),
        }
    }
}

/// How an inbound payment signal is matched to an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Correlation {
    /// The provider's reference, stored in `payment_details.transaction_id`.
    TransactionId(String),
    OrderId(OrderId),
}

impl Display for Correlation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Correlation::TransactionId(id) => write!(f, "transaction {id}"),
            Correlation::OrderId(id) => write!(f, "order {id}"),
        }
    }
}

/// A normalised payment signal, whether it came from a status query, a webhook, or the sandbox timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub provider: ProviderKind,
    pub correlation: Correlation,
    pub status: PaymentEventStatus,
    /// The raw status string from the provider, kept for the order's `payment_info`.
    pub provider_status: String,
}

impl PaymentEvent {
    pub fn new(
        provider: ProviderKind,
        correlation: Correlation,
        status: PaymentEventStatus,
        provider_status: impl Into<String>,
    ) -> Self {
        Self { provider, correlation, status, provider_status: provider_status.into() }
    }

    /// The text recorded in `payment_details.payment_info` when this event is applied.
    pub fn payment_info(&self) -> String {
        format!("{}: {}", self.provider, self.provider_status)
    }
}

/// The result of a provider status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub reference_id: String,
    pub status: PaymentEventStatus,
    pub provider_status: String,
}

impl ProviderStatus {
    pub fn new(
        reference_id: impl Into<String>,
        status: PaymentEventStatus,
        provider_status: impl Into<String>,
    ) -> Self {
        Self { reference_id: reference_id.into(), status, provider_status: provider_status.into() }
    }
}

/// An open payment session. Only its `reference_id` is persisted (as the order's transaction id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub provider: ProviderKind,
    pub reference_id: String,
    pub amount: Money,
    pub status: PaymentEventStatus,
    /// Stripe hands this to the browser to complete card entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Extra, provider-specific information needed to start a payment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateParams {
    /// The MSISDN to bill. MoMo falls back to the shipping phone number if this is absent.
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// An inbound webhook, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookPayload {
    pub body: String,
    pub signature: Option<String>,
}

impl WebhookPayload {
    pub fn new(body: impl Into<String>, signature: Option<String>) -> Self {
        Self { body: body.into(), signature }
    }
}

/// What [`crate::PaymentFlowApi::apply_event`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "order", rename_all = "snake_case")]
pub enum EventOutcome {
    /// This call changed the order.
    Applied(Order),
    /// The event was valid, but the order was already in (or past) the state it describes.
    NoOp(Order),
    /// No order matches the event's correlation id.
    Unrecognized(String),
}

impl EventOutcome {
    pub fn order(&self) -> Option<&Order> {
        match self {
            EventOutcome::Applied(o) | EventOutcome::NoOp(o) => Some(o),
            EventOutcome::Unrecognized(_) => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, EventOutcome::Applied(_))
    }
}
