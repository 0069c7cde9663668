use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer, Scope};
use log::*;
use ore_engine::{
    events::EventProducers,
    providers::sandbox::{ConfirmationScheduler, SandboxProvider},
    CheckoutApi,
    OrderStatusApi,
    PaymentFlowApi,
    ShippingApi,
    SqliteDatabase,
};
use payment_providers::{MomoApi, StripeApi};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{
        momo::MomoProvider,
        notifications::{create_notification_handlers, LogNotifier},
        stripe::StripeProvider,
        CardGateway,
        MomoGateway,
    },
    payment_event_worker::start_payment_event_worker,
    routes::{
        health,
        AddToCartRoute,
        CardPaymentIntentRoute,
        CheckoutRoute,
        ConfirmCardPaymentRoute,
        MomoPaymentStatusRoute,
        MomoWebhookRoute,
        OrderByIdRoute,
        SandboxWebhookRoute,
        SaveShippingRateRoute,
        ShippingQuoteRoute,
        ShippingRatesRoute,
        StartMomoPaymentRoute,
        StripeWebhookRoute,
        UpdateOrderStatusRoute,
        UpdateShippingStatusRoute,
    },
};

/// Everything a worker needs to build its API objects. Cloned into each worker by the server factory.
#[derive(Clone)]
pub struct ServerState {
    pub db: SqliteDatabase,
    pub producers: EventProducers,
    pub sandbox: SandboxProvider,
    pub momo: MomoProvider,
    pub stripe: StripeProvider,
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database is ready at {}", config.database_url);
    let handlers = create_notification_handlers(LogNotifier);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let scheduler = ConfirmationScheduler::new(config.sandbox.delay);
    let flow = PaymentFlowApi::new(db.clone(), producers.clone()).with_sandbox_scheduler(scheduler.clone());
    // The worker task lives as long as the sandbox holds a producer, i.e. for the lifetime of the server.
    let (sandbox_events, _worker) = start_payment_event_worker(flow);
    let sandbox = SandboxProvider::new(scheduler, sandbox_events).serving(&config.sandbox.methods);
    let momo = MomoProvider::new(MomoApi::new(config.momo.clone())?);
    let stripe = StripeProvider::new(StripeApi::new(config.stripe.clone())?);
    let state = ServerState { db, producers, sandbox, momo, stripe };
    let srv = create_server_instance(config, state)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, state: ServerState) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let ServerState { db, producers, sandbox, momo, stripe } = state.clone();
        let scheduler = sandbox.scheduler().clone();
        let flow_api = PaymentFlowApi::new(db.clone(), producers.clone()).with_sandbox_scheduler(scheduler.clone());
        let mut checkout_api = CheckoutApi::new(db.clone()).with_currency(&config.currency);
        if config.sandbox.auto_confirm {
            checkout_api = checkout_api.with_sandbox_auto_confirm(flow_api.clone(), sandbox.clone());
        }
        let status_api = OrderStatusApi::new(db.clone(), producers).with_sandbox_scheduler(scheduler);
        let shipping_api = ShippingApi::new(db);
        let api_scope = web::scope("/api")
            .service(AddToCartRoute::<SqliteDatabase>::new())
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(UpdateShippingStatusRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(StartMomoPaymentRoute::<SqliteDatabase, MomoProvider>::new())
            .service(MomoPaymentStatusRoute::<SqliteDatabase, MomoProvider>::new())
            .service(CardPaymentIntentRoute::<SqliteDatabase, StripeProvider>::new())
            .service(ConfirmCardPaymentRoute::<SqliteDatabase, StripeProvider>::new())
            .service(ShippingQuoteRoute::<SqliteDatabase>::new())
            .service(ShippingRatesRoute::<SqliteDatabase>::new())
            .service(SaveShippingRateRoute::<SqliteDatabase>::new());
        let webhooks = webhook_scope(config.sandbox.auto_confirm);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ore::access_log"))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(status_api))
            .app_data(web::Data::new(shipping_api))
            .app_data(web::Data::new(sandbox))
            .app_data(web::Data::new(MomoGateway(momo)))
            .app_data(web::Data::new(CardGateway(stripe)))
            .service(health)
            .service(api_scope)
            .service(webhooks)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Server listening on {}:{}", config.host, config.port);
    Ok(srv)
}

/// Provider callbacks. The sandbox callback is only mounted when the sandbox is running.
pub fn webhook_scope(sandbox_enabled: bool) -> Scope {
    let scope = web::scope("/webhook")
        .service(MomoWebhookRoute::<SqliteDatabase, MomoProvider>::new())
        .service(StripeWebhookRoute::<SqliteDatabase, StripeProvider>::new());
    if sandbox_enabled {
        scope.service(SandboxWebhookRoute::<SqliteDatabase>::new())
    } else {
        scope
    }
}
