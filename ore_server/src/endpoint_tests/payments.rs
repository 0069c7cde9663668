use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use ore_common::Secret;
use ore_engine::{
    db_types::{OrderId, PaymentMethod, PaymentStatus},
    events::{EventProducer, EventProducers},
    payment_objects::{Correlation, PaymentEvent, PaymentEventStatus, ProviderKind, ProviderStatus},
    providers::sandbox::{ConfirmationScheduler, SandboxProvider},
    traits::{OrderManagement, ProviderError},
    PaymentFlowApi,
    SqliteDatabase,
};
use payment_providers::{sign_webhook_payload, StripeApi, StripeConfig};
use tokio::sync::mpsc;

use super::{
    helpers::{fetch_order, json, place_order, provider, seeded_db, send_request, session_for},
    mocks::MockPaymentProvider,
};
use crate::{
    integrations::{stripe::StripeProvider, CardGateway, MomoGateway},
    server::webhook_scope,
    routes::{
        CardPaymentIntentRoute,
        ConfirmCardPaymentRoute,
        MomoPaymentStatusRoute,
        MomoWebhookRoute,
        SandboxWebhookRoute,
        StartMomoPaymentRoute,
        StripeWebhookRoute,
        STRIPE_SIGNATURE_HEADER,
    },
};

const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";

#[actix_web::test]
async fn start_momo_payment() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_initiate().times(1).returning(|order, params| {
        assert_eq!(params.phone.as_deref(), Some("250788123456"));
        Ok(session_for(order, ProviderKind::MoMo, "momo-ref-1"))
    });
    let req = TestRequest::post()
        .uri(&format!("/payments/momo/{}", order.id.as_str()))
        .set_json(serde_json::json!({ "phone": "250788123456" }));
    let (status, body) = send_request(req, configure_momo(db.clone(), momo)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["order_id"], order.id.as_str());
    assert_eq!(body["reference_id"], "momo-ref-1");
    assert_eq!(body["amount"], 6000);

    let order = fetch_order(&db, &order.id).await;
    assert_eq!(order.payment_details.transaction_id.as_deref(), Some("momo-ref-1"));
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn start_momo_payment_without_a_body() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_initiate().times(1).returning(|order, params| {
        assert!(params.phone.is_none());
        Ok(session_for(order, ProviderKind::MoMo, "momo-ref-2"))
    });
    let req = TestRequest::post().uri(&format!("/payments/momo/{}", order.id.as_str()));
    let (status, _) = send_request(req, configure_momo(db, momo)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn provider_failure_is_a_bad_gateway() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_initiate().times(1).returning(|_, _| Err(ProviderError::Network("connection refused".into())));
    let req = TestRequest::post().uri(&format!("/payments/momo/{}", order.id.as_str()));
    let (status, body) = send_request(req, configure_momo(db.clone(), momo)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json(&body)["error"].as_str().unwrap().contains("connection refused"));
    // A provider error is not a failed payment
    let order = fetch_order(&db, &order.id).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.payment_details.transaction_id.is_none());
}

#[actix_web::test]
async fn momo_cannot_pay_for_card_orders() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::Card).await;
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_initiate().never();
    let req = TestRequest::post().uri(&format!("/payments/momo/{}", order.id.as_str()));
    let (status, _) = send_request(req, configure_momo(db, momo)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let db = seeded_db().await;
    let momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    let req = TestRequest::post().uri("/payments/momo/no-such-order");
    let (status, _) = send_request(req, configure_momo(db, momo)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn polling_marks_the_order_paid() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    db.attach_transaction_id(&order.id, ProviderKind::MoMo, "momo-ref-3", "momo: PENDING").await.unwrap();
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_query_status()
        .times(1)
        .returning(|reference| Ok(ProviderStatus::new(reference, PaymentEventStatus::Successful, "SUCCESSFUL")));
    let req = TestRequest::get().uri(&format!("/payments/momo/{}/status", order.id.as_str()));
    let (status, body) = send_request(req, configure_momo(db.clone(), momo)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["applied"], true);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["order"]["payment_status"], "PAID");

    let order = fetch_order(&db, &order.id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.payment_details.payment_date.is_some());
}

#[actix_web::test]
async fn polling_without_a_session_is_a_conflict() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_query_status().never();
    let req = TestRequest::get().uri(&format!("/payments/momo/{}/status", order.id.as_str()));
    let (status, _) = send_request(req, configure_momo(db, momo)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

/// A MoMo-like mock whose unsigned webhooks claim `claimed` for `order_id`. Add a `query_status` expectation for
/// what MoMo itself reports.
fn momo_webhook(order_id: &OrderId, claimed: PaymentEventStatus) -> MockPaymentProvider {
    let order_id = order_id.clone();
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_verifies_webhooks().return_const(false);
    momo.expect_handle_webhook().times(1).returning(move |_| {
        let correlation = Correlation::OrderId(order_id.clone());
        Ok(PaymentEvent::new(ProviderKind::MoMo, correlation, claimed, claimed.to_string()))
    });
    momo
}

fn momo_reports(momo: &mut MockPaymentProvider, reference_id: &'static str, actual: PaymentEventStatus) {
    momo.expect_query_status().times(1).returning(move |reference| {
        assert_eq!(reference, reference_id);
        Ok(ProviderStatus::new(reference, actual, actual.to_string()))
    });
}

#[actix_web::test]
async fn momo_webhook_is_checked_with_momo() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    db.attach_transaction_id(&order.id, ProviderKind::MoMo, "momo-ref-4", "momo: PENDING").await.unwrap();
    let mut momo = momo_webhook(&order.id, PaymentEventStatus::Failed);
    momo_reports(&mut momo, "momo-ref-4", PaymentEventStatus::Failed);
    let req = TestRequest::post().uri("/momo").set_payload(r#"{"status":"FAILED"}"#);
    let (status, body) = send_request(req, configure_momo(db.clone(), momo)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["outcome"], "applied");
    assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Failed);
}

#[actix_web::test]
async fn forged_momo_webhooks_do_not_pay_orders() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    // No session yet, so MoMo is not even asked
    let mut momo = momo_webhook(&order.id, PaymentEventStatus::Successful);
    momo.expect_query_status().never();
    let req = TestRequest::post().uri("/momo").set_payload(r#"{"status":"SUCCESSFUL"}"#);
    let (status, body) = send_request(req, configure_momo(db.clone(), momo)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["outcome"], "unrecognized");
    assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Pending);

    db.attach_transaction_id(&order.id, ProviderKind::MoMo, "momo-ref-5", "momo: PENDING").await.unwrap();
    let mut momo = momo_webhook(&order.id, PaymentEventStatus::Successful);
    momo_reports(&mut momo, "momo-ref-5", PaymentEventStatus::Pending);
    let req = TestRequest::post().uri("/momo").set_payload(r#"{"status":"SUCCESSFUL"}"#);
    let (status, body) = send_request(req, configure_momo(db.clone(), momo)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["applied"], false);
    assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn momo_webhooks_cannot_settle_card_orders() {
    let db = seeded_db().await;
    let order = place_order(&db, "bob", PaymentMethod::Card).await;
    db.attach_transaction_id(&order.id, ProviderKind::Stripe, "pi_real", "stripe: requires_payment_method")
        .await
        .unwrap();
    let mut momo = momo_webhook(&order.id, PaymentEventStatus::Successful);
    momo.expect_query_status().never();
    let req = TestRequest::post().uri("/momo").set_payload(r#"{"status":"SUCCESSFUL"}"#);
    let (status, body) = send_request(req, configure_momo(db.clone(), momo)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["outcome"], "unrecognized");
    assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn webhooks_for_unknown_orders_are_acknowledged() {
    let db = seeded_db().await;
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_verifies_webhooks().return_const(false);
    momo.expect_handle_webhook().times(1).returning(|_| {
        let correlation = Correlation::OrderId(OrderId::from("not-ours"));
        Ok(PaymentEvent::new(ProviderKind::MoMo, correlation, PaymentEventStatus::Successful, "SUCCESSFUL"))
    });
    let req = TestRequest::post().uri("/momo").set_payload("{}");
    let (status, body) = send_request(req, configure_momo(db, momo)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["applied"], false);
    assert_eq!(body["outcome"], "unrecognized");
}

#[actix_web::test]
async fn malformed_webhooks_are_rejected() {
    let db = seeded_db().await;
    let mut momo = provider(ProviderKind::MoMo, PaymentMethod::MoMo);
    momo.expect_handle_webhook().times(1).returning(|_| Err(ProviderError::MalformedResponse("not json".into())));
    let req = TestRequest::post().uri("/momo").set_payload("garbage");
    let (status, _) = send_request(req, configure_momo(db, momo)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn card_payment_intent_returns_the_client_secret() {
    let db = seeded_db().await;
    let order = place_order(&db, "bob", PaymentMethod::Card).await;
    let mut card = provider(ProviderKind::Stripe, PaymentMethod::Card);
    card.expect_initiate().times(1).returning(|order, _| {
        let mut session = session_for(order, ProviderKind::Stripe, "pi_123");
        session.client_secret = Some("pi_123_secret_abc".into());
        Ok(session)
    });
    let req = TestRequest::post().uri(&format!("/payments/card/{}/intent", order.id.as_str()));
    let (status, body) = send_request(req, configure_card(db, card)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["provider"], "stripe");
    assert_eq!(body["client_secret"], "pi_123_secret_abc");
}

#[actix_web::test]
async fn confirming_a_card_payment_asks_the_provider() {
    let db = seeded_db().await;
    let order = place_order(&db, "bob", PaymentMethod::Card).await;
    db.attach_transaction_id(&order.id, ProviderKind::Stripe, "pi_456", "stripe: requires_payment_method").await.unwrap();
    let mut card = provider(ProviderKind::Stripe, PaymentMethod::Card);
    card.expect_query_status()
        .times(1)
        .returning(|reference| Ok(ProviderStatus::new(reference, PaymentEventStatus::Successful, "succeeded")));
    let uri = format!("/payments/card/{}/confirm", order.id.as_str());
    let (status, body) = send_request(TestRequest::post().uri(&uri), configure_card(db.clone(), card)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["outcome"], "applied");
    assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Paid);
}

#[actix_web::test]
async fn signed_stripe_webhooks_confirm_the_order() {
    let db = seeded_db().await;
    let order = place_order(&db, "bob", PaymentMethod::Card).await;
    db.attach_transaction_id(&order.id, ProviderKind::Stripe, "pi_789", "stripe: requires_payment_method").await.unwrap();
    let body = stripe_event("pi_789", "payment_intent.succeeded", "succeeded");
    let signature = sign_webhook_payload(&body, WEBHOOK_SECRET, chrono::Utc::now().timestamp()).unwrap();
    let req = TestRequest::post().uri("/stripe").insert_header((STRIPE_SIGNATURE_HEADER, signature)).set_payload(body);
    let (status, body) = send_request(req, configure_stripe(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["outcome"], "applied");
    assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Paid);
}

#[actix_web::test]
async fn stripe_webhooks_with_a_bad_signature_change_nothing() {
    let db = seeded_db().await;
    let order = place_order(&db, "bob", PaymentMethod::Card).await;
    db.attach_transaction_id(&order.id, ProviderKind::Stripe, "pi_999", "stripe: requires_payment_method").await.unwrap();
    let body = stripe_event("pi_999", "payment_intent.succeeded", "succeeded");
    let signature = sign_webhook_payload(&body, "whsec_someone_else", chrono::Utc::now().timestamp()).unwrap();
    let req = TestRequest::post().uri("/stripe").insert_header((STRIPE_SIGNATURE_HEADER, signature)).set_payload(body);
    let (status, _) = send_request(req, configure_stripe(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = stripe_event("pi_999", "payment_intent.succeeded", "succeeded");
    let req = TestRequest::post().uri("/stripe").set_payload(body);
    let (status, _) = send_request(req, configure_stripe(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn irrelevant_stripe_events_are_ignored() {
    let db = seeded_db().await;
    let body = r#"{"id":"evt_9","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#.to_string();
    let signature = sign_webhook_payload(&body, WEBHOOK_SECRET, chrono::Utc::now().timestamp()).unwrap();
    let req = TestRequest::post().uri("/stripe").insert_header((STRIPE_SIGNATURE_HEADER, signature)).set_payload(body);
    let (status, body) = send_request(req, configure_stripe(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["success"], true);
}

#[actix_web::test]
async fn sandbox_webhook() {
    let db = seeded_db().await;
    let order = place_order(&db, "carol", PaymentMethod::PayPal).await;
    db.attach_transaction_id(&order.id, ProviderKind::Sandbox, order.id.as_str(), "sandbox: PENDING").await.unwrap();
    let body = format!(r#"{{"order_id":"{}","status":"SUCCESSFUL"}}"#, order.id.as_str());
    let req = TestRequest::post().uri("/sandbox").set_payload(body);
    let (status, body) = send_request(req, configure_sandbox(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["outcome"], "applied");
    assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Paid);
}

#[actix_web::test]
async fn sandbox_webhooks_cannot_settle_real_sessions() {
    let db = seeded_db().await;
    let card = place_order(&db, "bob", PaymentMethod::Card).await;
    db.attach_transaction_id(&card.id, ProviderKind::Stripe, "pi_real", "stripe: requires_payment_method")
        .await
        .unwrap();
    let momo = place_order(&db, "alice", PaymentMethod::MoMo).await;
    for order in [&card, &momo] {
        let body = format!(r#"{{"order_id":"{}","status":"SUCCESSFUL"}}"#, order.id.as_str());
        let req = TestRequest::post().uri("/sandbox").set_payload(body);
        let (status, body) = send_request(req, configure_sandbox(db.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["outcome"], "unrecognized");
        assert_eq!(fetch_order(&db, &order.id).await.payment_status, PaymentStatus::Pending);
    }
}

#[actix_web::test]
async fn sandbox_webhook_is_only_served_in_sandbox_mode() {
    let db = seeded_db().await;
    let order = place_order(&db, "carol", PaymentMethod::PayPal).await;
    let body = format!(r#"{{"order_id":"{}","status":"SUCCESSFUL"}}"#, order.id.as_str());
    let req = TestRequest::post().uri("/webhook/sandbox").set_payload(body);
    let (status, _) = send_request(req, |cfg: &mut ServiceConfig| {
        cfg.service(webhook_scope(false));
    })
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = format!(r#"{{"order_id":"{}","status":"SUCCESSFUL"}}"#, order.id.as_str());
    let req = TestRequest::post().uri("/webhook/sandbox").set_payload(body);
    let (status, body) = send_request(req, move |cfg: &mut ServiceConfig| {
        let (tx, _rx) = mpsc::channel(1);
        let sandbox = SandboxProvider::new(ConfirmationScheduler::default(), EventProducer::new(tx));
        cfg.service(webhook_scope(true))
            .app_data(web::Data::new(PaymentFlowApi::new(db, EventProducers::default())))
            .app_data(web::Data::new(sandbox));
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["outcome"], "unrecognized");
}

fn stripe_event(intent_id: &str, event_type: &str, intent_status: &str) -> String {
    let intent = format!(r#"{{"id":"{intent_id}","status":"{intent_status}","amount":6000,"currency":"rwf"}}"#);
    format!(r#"{{"id":"evt_1","type":"{event_type}","data":{{"object":{intent}}}}}"#)
}

fn configure_momo(db: SqliteDatabase, momo: MockPaymentProvider) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(StartMomoPaymentRoute::<SqliteDatabase, MockPaymentProvider>::new())
            .service(MomoPaymentStatusRoute::<SqliteDatabase, MockPaymentProvider>::new())
            .service(MomoWebhookRoute::<SqliteDatabase, MockPaymentProvider>::new())
            .app_data(web::Data::new(PaymentFlowApi::new(db, EventProducers::default())))
            .app_data(web::Data::new(MomoGateway(momo)));
    }
}

fn configure_card(db: SqliteDatabase, card: MockPaymentProvider) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(CardPaymentIntentRoute::<SqliteDatabase, MockPaymentProvider>::new())
            .service(ConfirmCardPaymentRoute::<SqliteDatabase, MockPaymentProvider>::new())
            .app_data(web::Data::new(PaymentFlowApi::new(db, EventProducers::default())))
            .app_data(web::Data::new(CardGateway(card)));
    }
}

fn configure_sandbox(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let (tx, _rx) = mpsc::channel(1);
        let sandbox = SandboxProvider::new(ConfirmationScheduler::default(), EventProducer::new(tx));
        cfg.service(SandboxWebhookRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(PaymentFlowApi::new(db, EventProducers::default())))
            .app_data(web::Data::new(sandbox));
    }
}

fn configure_stripe(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let config = StripeConfig { webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()), ..Default::default() };
        let stripe = StripeProvider::new(StripeApi::new(config).expect("Error creating Stripe client"));
        cfg.service(StripeWebhookRoute::<SqliteDatabase, StripeProvider>::new())
            .app_data(web::Data::new(PaymentFlowApi::new(db, EventProducers::default())))
            .app_data(web::Data::new(CardGateway(stripe)));
    }
}
