use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use ore_common::Money;
use ore_engine::{
    db_types::{OrderStatusType, PaymentMethod, ShippingRate, ShippingStatus},
    events::EventProducers,
    traits::{CartManagement, CatalogManagement, OrderManagement},
    CheckoutApi,
    OrderStatusApi,
    ShippingApi,
    SqliteDatabase,
};
use serde_json::json as j;

use super::{
    helpers::{fetch_order, json, place_order, seeded_db, send_request},
    mocks::MockShippingRates,
};
use crate::routes::{
    health,
    AddToCartRoute,
    CheckoutRoute,
    OrderByIdRoute,
    SaveShippingRateRoute,
    ShippingQuoteRoute,
    ShippingRatesRoute,
    UpdateOrderStatusRoute,
    UpdateShippingStatusRoute,
};

#[actix_web::test]
async fn health_check() {
    let (status, body) = send_request(TestRequest::get().uri("/health"), |cfg: &mut ServiceConfig| {
        cfg.service(health);
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn checkout_places_an_order() {
    let db = seeded_db().await;
    let req = TestRequest::post().uri("/cart/alice/items").set_json(j!({"product_id": "coffee", "quantity": 2}));
    let (status, body) = send_request(req, configure_checkout(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)[0]["quantity"], 2);

    let req = TestRequest::post().uri("/checkout").set_json(checkout_request("Kigali", "MoMo"));
    let (status, body) = send_request(req, configure_checkout(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let order = json(&body);
    assert_eq!(order["subtotal"], 9000);
    assert_eq!(order["shipping_fee"], 1500);
    assert_eq!(order["total_price"], 10_500);
    assert_eq!(order["payment_status"], "PENDING");
    assert_eq!(order["currency"], "RWF");
    assert_eq!(order["items"][0]["price_at_purchase"], 4500);

    let coffee = db.fetch_product("coffee").await.unwrap().unwrap();
    assert_eq!(coffee.stock, 8);
    assert!(db.fetch_cart("alice").await.unwrap().is_empty());
}

#[actix_web::test]
async fn checkout_charges_the_fallback_fee() {
    let db = seeded_db().await;
    let req = TestRequest::post().uri("/cart/alice/items").set_json(j!({"product_id": "coffee", "quantity": 1}));
    send_request(req, configure_checkout(db.clone())).await;
    let req = TestRequest::post().uri("/checkout").set_json(checkout_request("Atlantis", "Card"));
    let (status, body) = send_request(req, configure_checkout(db)).await;
    assert_eq!(status, StatusCode::OK);
    let order = json(&body);
    assert_eq!(order["shipping_fee"], 2000);
    assert_eq!(order["total_price"], 6500);
}

#[actix_web::test]
async fn empty_carts_cannot_be_checked_out() {
    let db = seeded_db().await;
    let req = TestRequest::post().uri("/checkout").set_json(checkout_request("Kigali", "MoMo"));
    let (status, body) = send_request(req, configure_checkout(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].is_string());
}

#[actix_web::test]
async fn missing_shipping_details_are_rejected() {
    let db = seeded_db().await;
    let req = TestRequest::post().uri("/cart/alice/items").set_json(j!({"product_id": "coffee", "quantity": 1}));
    send_request(req, configure_checkout(db.clone())).await;
    let mut request = checkout_request("Kigali", "MoMo");
    request["shipping"]["phone"] = j!("  ");
    let req = TestRequest::post().uri("/checkout").set_json(request);
    let (status, _) = send_request(req, configure_checkout(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn insufficient_stock_is_a_conflict() {
    let db = seeded_db().await;
    let req = TestRequest::post().uri("/cart/alice/items").set_json(j!({"product_id": "coffee", "quantity": 11}));
    send_request(req, configure_checkout(db.clone())).await;
    let req = TestRequest::post().uri("/checkout").set_json(checkout_request("Kigali", "MoMo"));
    let (status, body) = send_request(req, configure_checkout(db.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json(&body)["error"].as_str().unwrap().contains("coffee"));
    // Nothing was taken, and the customer keeps the cart
    assert_eq!(db.fetch_product("coffee").await.unwrap().unwrap().stock, 10);
    assert_eq!(db.fetch_cart("alice").await.unwrap().len(), 1);
}

#[actix_web::test]
async fn unknown_products_cannot_be_added() {
    let db = seeded_db().await;
    let req = TestRequest::post().uri("/cart/alice/items").set_json(j!({"product_id": "tea", "quantity": 1}));
    let (status, _) = send_request(req, configure_checkout(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fetch_order_by_id() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    let req = TestRequest::get().uri(&format!("/orders/{}", order.id.as_str()));
    let (status, body) = send_request(req, configure_orders(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["id"], order.id.as_str());

    let (status, _) = send_request(TestRequest::get().uri("/orders/nope"), configure_orders(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unpaid_orders_are_not_promoted_to_delivered() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    let uri = format!("/orders/{}/shipping", order.id.as_str());
    let req = TestRequest::patch().uri(&uri).set_json(j!({"status": "DELIVERED"}));
    let (status, body) = send_request(req, configure_orders(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["order_status"], "PENDING");
    assert_eq!(body["shipping"]["status"], "DELIVERED");
}

#[actix_web::test]
async fn cancelled_orders_are_not_shipped() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    OrderStatusApi::new(db.clone(), EventProducers::default())
        .update_order_status(&order.id, OrderStatusType::Cancelled)
        .await
        .unwrap();
    let uri = format!("/orders/{}/shipping", order.id.as_str());
    let req = TestRequest::patch().uri(&uri).set_json(j!({"status": "IN_TRANSIT"}));
    let (status, _) = send_request(req, configure_orders(db.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(fetch_order(&db, &order.id).await.shipping.status, ShippingStatus::NotShipped);
}

#[actix_web::test]
async fn paid_orders_are_shipped_and_delivered() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    db.mark_order_paid(&order.id, "sandbox: SUCCESSFUL").await.unwrap();
    let uri = format!("/orders/{}/shipping", order.id.as_str());
    let req = TestRequest::patch().uri(&uri).set_json(j!({"status": "SHIPPED"}));
    let (status, body) = send_request(req, configure_orders(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["order_status"], "SHIPPED");

    let req = TestRequest::patch().uri(&uri).set_json(j!({"status": "DELIVERED"}));
    let (status, _) = send_request(req, configure_orders(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let order = fetch_order(&db, &order.id).await;
    assert_eq!(order.order_status, OrderStatusType::Delivered);
    assert_eq!(order.shipping.status, ShippingStatus::Delivered);
}

#[actix_web::test]
async fn admins_can_cancel_orders() {
    let db = seeded_db().await;
    let order = place_order(&db, "alice", PaymentMethod::MoMo).await;
    let uri = format!("/orders/{}/status", order.id.as_str());
    let req = TestRequest::patch().uri(&uri).set_json(j!({"status": "CANCELLED"}));
    let (status, _) = send_request(req, configure_orders(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetch_order(&db, &order.id).await.order_status, OrderStatusType::Cancelled);

    let req = TestRequest::patch().uri(&uri).set_json(j!({"status": "NOT_A_STATUS"}));
    let (status, _) = send_request(req, configure_orders(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn quote_for_a_known_city() {
    let mut rates = MockShippingRates::new();
    rates.expect_find_active_rate().times(1).returning(|city| {
        assert_eq!(city, "Kigali");
        let fee = Money::from(1500);
        Ok(Some(ShippingRate { id: 1, city: "Kigali".into(), fee, is_default: false, is_active: true }))
    });
    rates.expect_find_default_rate().never();
    let req = TestRequest::get().uri("/shipping_rates/quote?city=%20Kigali%20");
    let (status, body) = send_request(req, configure_rates(rates)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["fee"], 1500);
}

#[actix_web::test]
async fn quote_falls_back_when_nothing_is_configured() {
    let mut rates = MockShippingRates::new();
    rates.expect_find_active_rate().returning(|_| Ok(None));
    rates.expect_find_default_rate().times(1).returning(|| Ok(None));
    let req = TestRequest::get().uri("/shipping_rates/quote?city=Musanze");
    let (status, body) = send_request(req, configure_rates(rates)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["city"], "Musanze");
    assert_eq!(body["fee"], 2000);
}

#[actix_web::test]
async fn negative_rates_are_rejected() {
    let mut rates = MockShippingRates::new();
    rates.expect_save_rate().never();
    let req = TestRequest::post().uri("/shipping_rates").set_json(j!({"city": "Huye", "fee": -1}));
    let (status, _) = send_request(req, configure_rates(rates)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn saving_and_listing_rates() {
    let db = seeded_db().await;
    let req = TestRequest::post().uri("/shipping_rates").set_json(j!({"city": " Huye ", "fee": 2500}));
    let (status, body) = send_request(req, configure_real_rates(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let rate = json(&body);
    assert_eq!(rate["city"], "Huye");
    assert_eq!(rate["is_active"], true);

    let (status, body) = send_request(TestRequest::get().uri("/shipping_rates"), configure_real_rates(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(|a| a.len()), Some(2));
}

fn checkout_request(city: &str, method: &str) -> serde_json::Value {
    j!({
        "customer_id": "alice",
        "email": "alice@example.com",
        "shipping": { "full_name": "Alice M", "phone": "250788000001", "city": city, "address_line": "KN 3 Rd" },
        "payment_method": method,
    })
}

fn configure_checkout(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(AddToCartRoute::<SqliteDatabase>::new())
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(CheckoutApi::new(db).with_currency("RWF")));
    }
}

fn configure_orders(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(UpdateShippingStatusRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(OrderStatusApi::new(db, EventProducers::default())));
    }
}

fn configure_rates(rates: MockShippingRates) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(ShippingQuoteRoute::<MockShippingRates>::new())
            .service(SaveShippingRateRoute::<MockShippingRates>::new())
            .app_data(web::Data::new(ShippingApi::new(rates)));
    }
}

fn configure_real_rates(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(ShippingQuoteRoute::<SqliteDatabase>::new())
            .service(ShippingRatesRoute::<SqliteDatabase>::new())
            .service(SaveShippingRateRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(ShippingApi::new(db)));
    }
}
