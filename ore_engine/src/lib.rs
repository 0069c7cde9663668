//! Order & Payment Reconciliation Engine
//!
//! This library turns shopping carts into durable orders and drives those orders through a payment lifecycle that
//! involves several payment providers, some of which report back asynchronously, out of order, or more than once.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend, [`SqliteDatabase`]). Backends implement the store traits;
//!    nothing outside the backend touches SQL. The domain types live in [`db_types`].
//! 2. The engine API ([`CheckoutApi`], [`PaymentFlowApi`], [`OrderStatusApi`] and [`ShippingApi`]). These hold the
//!    business rules and are generic over the backend.
//! 3. Events ([`mod@events`]). Order confirmations and deliveries are published to subscribers, which is how customer
//!    notifications are sent without the engine ever waiting on them.
//!
//! The sandbox payment provider lives in [`providers::sandbox`]. Adapters for external gateways are provided by the
//! server crate.
pub mod db_types;
pub mod events;
mod ore_api;
pub mod providers;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use ore_api::{
    checkout_api::CheckoutApi,
    errors::{CheckoutError, OrderStatusError, PaymentFlowError, ShippingRateError},
    order_status_api::{plan_order_update, plan_shipping_update, OrderStatusApi, MAX_STATUS_UPDATE_ATTEMPTS},
    payment_flow_api::PaymentFlowApi,
    payment_objects,
    shipping_api::{ShippingApi, FALLBACK_SHIPPING_FEE},
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
