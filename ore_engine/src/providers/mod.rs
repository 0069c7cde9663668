//! Payment providers that live entirely inside the engine. Providers that talk to external gateways are wired up by
//! the server.
pub mod sandbox;
