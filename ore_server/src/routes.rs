//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, payment provider calls, etc.)
//! should be expressed as futures or asynchronous functions. Async handlers get executed concurrently by worker
//! threads and thus don’t block execution.
//!
//! Payment provider handlers are generic over the provider, and are registered once per gateway. The gateway is
//! looked up from app data via the [`MomoGateway`] and [`CardGateway`] wrappers.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use ore_engine::{
    db_types::{CartItem, NewShippingRate, OrderId},
    payment_objects::{InitiateParams, WebhookPayload},
    providers::sandbox::SandboxProvider,
    traits::{OrderManagement, PaymentProvider, ProviderError, ReconciliationDatabase, ShippingRateManagement},
    CheckoutApi,
    OrderStatusApi,
    PaymentFlowApi,
    PaymentFlowError,
    ShippingApi,
};

use crate::{
    data_objects::{
        AddToCartRequest,
        CheckoutRequest,
        JsonResponse,
        OrderStatusUpdate,
        PaymentSessionResponse,
        PaymentStatusResponse,
        ShippingQuote,
        ShippingQuoteParams,
        ShippingStatusUpdate,
    },
    errors::ServerError,
    integrations::{CardGateway, MomoGateway},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Cart & checkout  -------------------------------------------------
route!(add_to_cart => Post "/cart/{customer_id}/items" impl ReconciliationDatabase);
pub async fn add_to_cart<B: ReconciliationDatabase>(
    path: web::Path<String>,
    body: web::Json<AddToCartRequest>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let customer_id = path.into_inner();
    let AddToCartRequest { product_id, quantity } = body.into_inner();
    debug!("💻️ POST {quantity} x {product_id} to the cart for {customer_id}");
    let cart = api.add_to_cart(&customer_id, CartItem::new(product_id, quantity)).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(checkout => Post "/checkout" impl ReconciliationDatabase);
/// Route handler for checkout
///
/// Turns everything in the customer's cart into a single `PENDING` order. Stock is reserved for every line and the
/// cart is emptied. If any line cannot be reserved, nothing changes and the request fails with 409.
///
/// With sandbox auto-confirm switched on, a confirmation is also scheduled for the new order.
pub async fn checkout<B: ReconciliationDatabase>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST checkout for {} ({})", request.customer_id, request.payment_method);
    let order = api.place_order(request.customer(), request.shipping, request.payment_method).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_shipping_status => Patch "/orders/{order_id}/shipping" impl OrderManagement);
/// Seller-facing shipping update. The order itself only becomes `DELIVERED` once it has been paid, and the delivery
/// notification goes out the first time that happens.
pub async fn update_shipping_status<B: OrderManagement>(
    path: web::Path<String>,
    body: web::Json<ShippingStatusUpdate>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let status = body.into_inner().status;
    debug!("💻️ PATCH shipping status for order {order_id} to {status}");
    let order = api.update_shipping_status(&order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Patch "/orders/{order_id}/status" impl OrderManagement);
/// Admin override of the order status.
pub async fn update_order_status<B: OrderManagement>(
    path: web::Path<String>,
    body: web::Json<OrderStatusUpdate>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let status = body.into_inner().status;
    info!("💻️ PATCH order status for order {order_id} to {status}");
    let order = api.update_order_status(&order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(start_momo_payment => Post "/payments/momo/{order_id}" impl OrderManagement, PaymentProvider);
/// Sends a request-to-pay to the customer's phone. The body is optional; `phone` defaults to the shipping phone
/// number and `currency` to the order's currency.
pub async fn start_momo_payment<B: OrderManagement, P: PaymentProvider>(
    path: web::Path<String>,
    body: Option<web::Json<InitiateParams>>,
    api: web::Data<PaymentFlowApi<B>>,
    gateway: web::Data<MomoGateway<P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    start_payment(api.as_ref(), &gateway.0, order_id, params).await
}

route!(momo_payment_status => Get "/payments/momo/{order_id}/status" impl OrderManagement, PaymentProvider);
/// Asks MoMo for the current state of the order's payment and reconciles the answer.
pub async fn momo_payment_status<B: OrderManagement, P: PaymentProvider>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
    gateway: web::Data<MomoGateway<P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET MoMo payment status for order {order_id}");
    let outcome = api.poll_payment(&gateway.0, &order_id).await?;
    Ok(HttpResponse::Ok().json(PaymentStatusResponse::from(outcome)))
}

route!(card_payment_intent => Post "/payments/card/{order_id}/intent" impl OrderManagement, PaymentProvider);
/// Creates a payment intent for the order. The response carries the `client_secret` the browser needs.
pub async fn card_payment_intent<B: OrderManagement, P: PaymentProvider>(
    path: web::Path<String>,
    body: Option<web::Json<InitiateParams>>,
    api: web::Data<PaymentFlowApi<B>>,
    gateway: web::Data<CardGateway<P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    start_payment(api.as_ref(), &gateway.0, order_id, params).await
}

route!(confirm_card_payment => Post "/payments/card/{order_id}/confirm" impl OrderManagement, PaymentProvider);
/// Called by the storefront once the browser has finished with the card. The intent is re-read from Stripe; what
/// the client says about the outcome is never trusted.
pub async fn confirm_card_payment<B: OrderManagement, P: PaymentProvider>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
    gateway: web::Data<CardGateway<P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ POST card payment confirmation for order {order_id}");
    let outcome = api.confirm_payment(&gateway.0, &order_id).await?;
    Ok(HttpResponse::Ok().json(PaymentStatusResponse::from(outcome)))
}

async fn start_payment<B: OrderManagement, P: PaymentProvider>(
    api: &PaymentFlowApi<B>,
    provider: &P,
    order_id: OrderId,
    params: InitiateParams,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST start {} payment for order {order_id}", provider.kind());
    let session = api.start_payment(provider, &order_id, &params).await?;
    Ok(HttpResponse::Ok().json(PaymentSessionResponse { order_id: order_id.as_str().to_string(), session }))
}

//----------------------------------------------   Shipping rates  -------------------------------------------------
route!(save_shipping_rate => Post "/shipping_rates" impl ShippingRateManagement);
pub async fn save_shipping_rate<B: ShippingRateManagement>(
    body: web::Json<NewShippingRate>,
    api: web::Data<ShippingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let rate = api.save_rate(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rate))
}

route!(shipping_rates => Get "/shipping_rates" impl ShippingRateManagement);
pub async fn shipping_rates<B: ShippingRateManagement>(
    api: web::Data<ShippingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let rates = api.rates().await?;
    Ok(HttpResponse::Ok().json(rates))
}

route!(shipping_quote => Get "/shipping_rates/quote" impl ShippingRateManagement);
/// The fee that checkout would charge for delivery to `city`. Unknown cities get the default rate.
pub async fn shipping_quote<B: ShippingRateManagement>(
    query: web::Query<ShippingQuoteParams>,
    api: web::Data<ShippingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let city = query.into_inner().city;
    let fee = api.resolve(&city).await?;
    Ok(HttpResponse::Ok().json(ShippingQuote { city, fee }))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(momo_webhook => Post "/momo" impl OrderManagement, PaymentProvider);
pub async fn momo_webhook<B: OrderManagement, P: PaymentProvider>(
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B>>,
    gateway: web::Data<MomoGateway<P>>,
) -> Result<HttpResponse, ServerError> {
    let payload = WebhookPayload::new(body_as_string(body)?, None);
    process_webhook(api.as_ref(), &gateway.0, payload).await
}

route!(stripe_webhook => Post "/stripe" impl OrderManagement, PaymentProvider);
/// Stripe webhooks must carry a valid `Stripe-Signature` header, computed over the raw body. Requests that fail
/// verification are rejected with 400 and change nothing.
pub async fn stripe_webhook<B: OrderManagement, P: PaymentProvider>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B>>,
    gateway: web::Data<CardGateway<P>>,
) -> Result<HttpResponse, ServerError> {
    let signature = req
        .headers()
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let payload = WebhookPayload::new(body_as_string(body)?, signature);
    process_webhook(api.as_ref(), &gateway.0, payload).await
}

route!(sandbox_webhook => Post "/sandbox" impl OrderManagement);
/// Lets developers push a sandbox payment result by hand, e.g. `{"order_id": "...", "status": "FAILED"}`.
/// Only orders with an open sandbox session are affected.
pub async fn sandbox_webhook<B: OrderManagement>(
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B>>,
    sandbox: web::Data<SandboxProvider>,
) -> Result<HttpResponse, ServerError> {
    let payload = WebhookPayload::new(body_as_string(body)?, None);
    process_webhook(api.as_ref(), sandbox.as_ref(), payload).await
}

/// Webhooks about things we don't track are acknowledged, so that the provider stops retrying them.
async fn process_webhook<B: OrderManagement, P: PaymentProvider>(
    api: &PaymentFlowApi<B>,
    provider: &P,
    payload: WebhookPayload,
) -> Result<HttpResponse, ServerError> {
    match api.process_webhook(provider, &payload).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(PaymentStatusResponse::from(outcome))),
        Err(PaymentFlowError::Provider(ProviderError::UnknownReference(reference))) => {
            info!("💻️ Ignoring {} webhook about {reference}", provider.kind());
            Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Ignored. {reference}"))))
        },
        Err(PaymentFlowError::Provider(e)) => Err(ServerError::from(e)),
        Err(e) => Err(e.into()),
    }
}

fn body_as_string(body: web::Bytes) -> Result<String, ServerError> {
    String::from_utf8(body.to_vec()).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))
}
