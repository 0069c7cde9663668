//! # Order & payment reconciliation server
//!
//! This crate exposes the reconciliation engine over HTTP. It is responsible for:
//! * Checkout: turning carts into orders.
//! * Starting payments with MoMo (request-to-pay) and Stripe (payment intents), and polling their status.
//! * Receiving payment webhooks from MoMo, Stripe and the payment sandbox.
//! * Seller shipping updates and admin order status overrides.
//! * Sending order confirmation and delivery notifications.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Cart, checkout, order, payment and shipping rate endpoints. See [routes](routes/index.html).
//! * `/webhook/{momo,stripe}`: Payment provider callbacks. `/webhook/sandbox` is added when sandbox auto-confirm is on.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod payment_event_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
