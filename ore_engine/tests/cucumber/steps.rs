use std::time::Duration;

use cucumber::{then, when};
use futures_util::future::join_all;
use ore_common::Money;
use ore_engine::{
    db_types::{CartItem, OrderStatusType, PaymentMethod, PaymentStatus, ShippingStatus},
    payment_objects::{Correlation, PaymentEvent, PaymentEventStatus, ProviderKind},
    traits::{CartManagement, OrderManagement},
};

use crate::{
    cucumber::ReconciliationWorld,
    support::{customer_named, shipping_to},
};

#[when(expr = "customer '{word}' adds {int} of '{word}' to the cart")]
async fn add_to_cart(world: &mut ReconciliationWorld, customer: String, quantity: i64, product_id: String) {
    let checkout = world.system().harness.checkout();
    checkout.add_to_cart(&customer, CartItem::new(product_id, quantity)).await.expect("Error adding to cart");
}

/// A successful checkout also opens the MoMo session that the payment steps report on.
#[when(expr = "customer '{word}' checks out with delivery to '{word}'")]
async fn check_out(world: &mut ReconciliationWorld, customer: String, city: String) {
    let system = world.system();
    let checkout = system.harness.checkout();
    match checkout.place_order(customer_named(&customer), shipping_to(&city), PaymentMethod::MoMo).await {
        Ok(order) => {
            system.harness.open_session(&order).await;
            system.orders.insert(customer, order.id);
            system.last_error = None;
        },
        Err(e) => system.last_error = Some(e.to_string()),
    }
}

async fn payment_event(world: &mut ReconciliationWorld, customer: &str, status: PaymentEventStatus) {
    let system = world.system();
    let order_id = system.order_for(customer);
    let event = PaymentEvent::new(ProviderKind::MoMo, Correlation::OrderId(order_id), status, status.to_string());
    system.harness.flow().apply_event(event).await.expect("Error applying payment event");
}

#[when(expr = "the payment for '{word}' succeeds")]
async fn payment_succeeds(world: &mut ReconciliationWorld, customer: String) {
    payment_event(world, &customer, PaymentEventStatus::Successful).await;
}

#[when(expr = "the payment for '{word}' fails")]
async fn payment_fails(world: &mut ReconciliationWorld, customer: String) {
    payment_event(world, &customer, PaymentEventStatus::Failed).await;
}

#[when(expr = "the provider reports success for '{word}' {int} times at once")]
async fn concurrent_success(world: &mut ReconciliationWorld, customer: String, times: usize) {
    let system = world.system();
    let order_id = system.order_for(&customer);
    let flow = system.harness.flow();
    let results = join_all((0..times).map(|_| {
        let status = PaymentEventStatus::Successful;
        let event = PaymentEvent::new(ProviderKind::MoMo, Correlation::OrderId(order_id.clone()), status, "SUCCESSFUL");
        flow.apply_event(event)
    }))
    .await;
    assert!(results.iter().all(|r| r.is_ok()), "Some events were not applied: {results:?}");
}

#[when(expr = "the seller marks the order for '{word}' as {word}")]
async fn seller_update(world: &mut ReconciliationWorld, customer: String, status: String) {
    let status = status.parse::<ShippingStatus>().expect("Not a shipping status");
    let system = world.system();
    let order_id = system.order_for(&customer);
    let result = system.harness.status_api().update_shipping_status(&order_id, status).await;
    system.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "an admin sets the order for '{word}' to {word}")]
async fn admin_update(world: &mut ReconciliationWorld, customer: String, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Not an order status");
    let system = world.system();
    let order_id = system.order_for(&customer);
    let result = system.harness.status_api().update_order_status(&order_id, status).await;
    system.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut ReconciliationWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "the order for '{word}' has a total of {int} RWF")]
async fn check_total(world: &mut ReconciliationWorld, customer: String, total: i64) {
    let system = world.system();
    let order_id = system.order_for(&customer);
    let order = system.harness.db.fetch_order(&order_id).await.expect("Error fetching order").expect("No order");
    assert_eq!(order.total_price, Money::from(total), "Total price is incorrect");
    assert_eq!(order.total_price, order.subtotal + order.shipping_fee);
}

#[then(expr = "the order for '{word}' is {word} with payment {word} and shipping {word}")]
async fn check_statuses(
    world: &mut ReconciliationWorld,
    customer: String,
    order_status: String,
    payment_status: String,
    shipping_status: String,
) {
    let system = world.system();
    let order_id = system.order_for(&customer);
    let order = system.harness.db.fetch_order(&order_id).await.expect("Error fetching order").expect("No order");
    assert_eq!(order.order_status, order_status.parse::<OrderStatusType>().expect("Not an order status"));
    assert_eq!(order.payment_status, payment_status.parse::<PaymentStatus>().expect("Not a payment status"));
    assert_eq!(order.shipping.status, shipping_status.parse::<ShippingStatus>().expect("Not a shipping status"));
}

#[then(expr = "the last request failed with {string}")]
async fn check_error(world: &mut ReconciliationWorld, expected: String) {
    let err = world.system().last_error.clone().expect("The last request succeeded");
    assert!(err.contains(&expected), "Expected an error containing '{expected}', got '{err}'");
}

#[then("the last request succeeded")]
async fn check_success(world: &mut ReconciliationWorld) {
    let err = world.system().last_error.clone();
    assert!(err.is_none(), "The last request failed: {err:?}");
}

#[then(expr = "'{word}' has {int} in stock")]
async fn check_stock(world: &mut ReconciliationWorld, product_id: String, stock: i64) {
    let actual = world.system().harness.stock_of(&product_id).await;
    assert_eq!(actual, stock, "Stock level for {product_id} is incorrect");
}

#[then(expr = "the cart for '{word}' has {int} line(s)")]
async fn check_cart(world: &mut ReconciliationWorld, customer: String, lines: usize) {
    let cart = world.system().harness.db.fetch_cart(&customer).await.expect("Error fetching cart");
    assert_eq!(cart.len(), lines, "Cart for {customer} is incorrect");
}

#[then(expr = "{int} order confirmation(s) has/have been sent")]
async fn check_confirmations(world: &mut ReconciliationWorld, expected: usize) {
    let (confirmations, _) = world.system().notifications();
    assert_eq!(confirmations, expected, "Wrong number of order confirmations");
}

#[then(expr = "{int} delivery notification(s) has/have been sent")]
async fn check_deliveries(world: &mut ReconciliationWorld, expected: usize) {
    let (_, deliveries) = world.system().notifications();
    assert_eq!(deliveries, expected, "Wrong number of delivery notifications");
}
