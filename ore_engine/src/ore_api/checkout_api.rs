use std::fmt::Debug;

use log::*;
use ore_common::DEFAULT_CURRENCY_CODE;

use crate::{
    db_types::{CartItem, Customer, NewOrder, NewShippingInfo, Order, OrderItem, PaymentMethod, Product},
    ore_api::{errors::CheckoutError, payment_flow_api::PaymentFlowApi, shipping_api::ShippingApi},
    payment_objects::InitiateParams,
    providers::sandbox::SandboxProvider,
    traits::{PaymentProvider, ReconciliationDatabase},
};

/// `CheckoutApi` turns a customer's cart into a durable order.
///
/// Stock for every line is reserved before the order is written. If anything goes wrong after the first reservation,
/// every unit taken by this call is given back before the error is returned.
pub struct CheckoutApi<B> {
    db: B,
    shipping: ShippingApi<B>,
    currency: String,
    auto_confirm: Option<(PaymentFlowApi<B>, SandboxProvider)>,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({}, auto-confirm: {})", self.currency, self.auto_confirm.is_some())
    }
}

impl<B: Clone> CheckoutApi<B> {
    pub fn new(db: B) -> Self {
        let shipping = ShippingApi::new(db.clone());
        Self { db, shipping, currency: DEFAULT_CURRENCY_CODE.to_string(), auto_confirm: None }
    }
}

impl<B> CheckoutApi<B> {
    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    /// New orders paid with a method the sandbox serves immediately get a sandbox payment session, which confirms
    /// itself after the sandbox delay. Orders paid any other way wait for their own provider.
    pub fn with_sandbox_auto_confirm(mut self, flow: PaymentFlowApi<B>, sandbox: SandboxProvider) -> Self {
        self.auto_confirm = Some((flow, sandbox));
        self
    }
}

impl<B> CheckoutApi<B>
where B: ReconciliationDatabase
{
    /// Adds a line to the customer's cart. The product must exist. Stock is only checked at checkout.
    pub async fn add_to_cart(&self, customer_id: &str, item: CartItem) -> Result<Vec<CartItem>, CheckoutError> {
        if customer_id.trim().is_empty() {
            return Err(CheckoutError::Validation("customer id must not be empty".into()));
        }
        if item.quantity < 1 {
            return Err(CheckoutError::Validation(format!("quantity must be at least 1 (got {})", item.quantity)));
        }
        if self.db.fetch_product(&item.product_id).await?.is_none() {
            return Err(CheckoutError::ProductNotFound(item.product_id));
        }
        let cart = self.db.add_to_cart(customer_id, item).await?;
        trace!("🛒️ Cart for {customer_id} now has {} lines", cart.len());
        Ok(cart)
    }

    /// Places an order for everything in the customer's cart.
    ///
    /// On success, stock has been taken for every line, the order is stored as `PENDING`, and the cart is empty.
    /// On failure, stock and cart are as they were (modulo concurrent activity by other customers).
    pub async fn place_order(
        &self,
        customer: Customer,
        shipping: NewShippingInfo,
        payment_method: PaymentMethod,
    ) -> Result<Order, CheckoutError> {
        let shipping = validate(&customer, shipping)?;
        let cart = self.db.fetch_cart(&customer.id).await?;
        if cart.is_empty() {
            debug!("🛒️ Customer {} tried to check out with an empty cart", customer.id);
            return Err(CheckoutError::EmptyCart);
        }
        let lines = self.check_stock(&cart).await?;
        let reserved = self.reserve_stock(&lines).await?;
        let items = lines
            .into_iter()
            .map(|(product, quantity)| OrderItem {
                product_id: product.id,
                seller_id: product.seller_id,
                product_name: product.name,
                quantity,
                price_at_purchase: product.price,
            })
            .collect::<Vec<_>>();
        let shipping_fee = match self.shipping.resolve(&shipping.city).await {
            Ok(fee) => fee,
            Err(e) => {
                self.release_stock(&reserved).await;
                return Err(e.into());
            },
        };
        let new_order = match NewOrder::new(customer, items, shipping_fee, &self.currency, payment_method, shipping) {
            Ok(order) => order,
            Err(e) => {
                debug!("🛒️ Refusing the order. {e}");
                self.release_stock(&reserved).await;
                return Err(CheckoutError::Validation(e.to_string()));
            },
        };
        let order = match self.db.create_order_and_clear_cart(new_order).await {
            Ok(order) => order,
            Err(e) => {
                error!("🛒️ Could not save the order. Giving back reserved stock. {e}");
                self.release_stock(&reserved).await;
                return Err(e.into());
            },
        };
        info!(
            "🛒️ Order {} placed by {}. {} items, subtotal {}, shipping {}, total {} {}",
            order.id,
            order.customer_id,
            order.items.len(),
            order.subtotal,
            order.shipping_fee,
            order.total_price,
            order.currency
        );
        self.auto_confirm(order).await
    }

    async fn auto_confirm(&self, order: Order) -> Result<Order, CheckoutError> {
        let Some((flow, sandbox)) = &self.auto_confirm else {
            return Ok(order);
        };
        if !sandbox.supports(order.payment_method) {
            trace!("🛒️ Order {} is paid with {}. The sandbox leaves it alone.", order.id, order.payment_method);
            return Ok(order);
        }
        match flow.start_payment(sandbox, &order.id, &InitiateParams::default()).await {
            Ok(session) => {
                debug!("🛒️ Sandbox session {} started for order {}", session.reference_id, order.id);
                let order = self.db.fetch_order(&order.id).await?.unwrap_or(order);
                Ok(order)
            },
            Err(e) => {
                // The order exists. The customer can still pay through another route.
                warn!("🛒️ Could not start a sandbox session for order {}: {e}", order.id);
                Ok(order)
            },
        }
    }

    /// Checks every line against live stock without changing anything.
    async fn check_stock(&self, cart: &[CartItem]) -> Result<Vec<(Product, i64)>, CheckoutError> {
        let mut lines = Vec::with_capacity(cart.len());
        for item in cart {
            if item.quantity < 1 {
                return Err(CheckoutError::Validation(format!(
                    "cart line for {} has quantity {}",
                    item.product_id, item.quantity
                )));
            }
            let product = self
                .db
                .fetch_product(&item.product_id)
                .await?
                .ok_or_else(|| CheckoutError::ProductNotFound(item.product_id.clone()))?;
            if product.stock < item.quantity {
                debug!("🛒️ Not enough {} in stock: {} < {}", product.id, product.stock, item.quantity);
                return Err(insufficient_stock(&product, item.quantity, product.stock));
            }
            lines.push((product, item.quantity));
        }
        Ok(lines)
    }

    /// Takes stock line by line. If a line cannot be reserved (a concurrent buyer got there first), everything
    /// reserved so far is put back.
    async fn reserve_stock(&self, lines: &[(Product, i64)]) -> Result<Vec<(String, i64)>, CheckoutError> {
        let mut reserved = Vec::with_capacity(lines.len());
        for (product, quantity) in lines {
            match self.db.decrement_stock_if_sufficient(&product.id, *quantity).await {
                Ok(true) => reserved.push((product.id.clone(), *quantity)),
                Ok(false) => {
                    self.release_stock(&reserved).await;
                    let available =
                        self.db.fetch_product(&product.id).await?.map(|p| p.stock).unwrap_or_default();
                    info!("🛒️ Lost a race for {}. Only {available} left", product.id);
                    return Err(insufficient_stock(product, *quantity, available));
                },
                Err(e) => {
                    self.release_stock(&reserved).await;
                    return Err(e.into());
                },
            }
        }
        Ok(reserved)
    }

    async fn release_stock(&self, reserved: &[(String, i64)]) {
        for (product_id, quantity) in reserved {
            match self.db.restore_stock(product_id, *quantity).await {
                Ok(()) => trace!("🛒️ Restored {quantity} units of {product_id}"),
                Err(e) => error!("🛒️ Could not restore {quantity} units of {product_id}. Stock is now too low. {e}"),
            }
        }
    }
}

fn insufficient_stock(product: &Product, requested: i64, available: i64) -> CheckoutError {
    CheckoutError::InsufficientStock {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        requested,
        available,
    }
}

fn validate(customer: &Customer, shipping: NewShippingInfo) -> Result<NewShippingInfo, CheckoutError> {
    if customer.id.trim().is_empty() {
        return Err(CheckoutError::Validation("customer id must not be empty".into()));
    }
    if customer.email.trim().is_empty() {
        return Err(CheckoutError::Validation("customer email must not be empty".into()));
    }
    let missing = shipping.missing_fields();
    if !missing.is_empty() {
        return Err(CheckoutError::Validation(format!("missing shipping fields: {}", missing.join(", "))));
    }
    Ok(NewShippingInfo::new(
        shipping.full_name.trim(),
        shipping.phone.trim(),
        shipping.city.trim(),
        shipping.address_line.trim(),
    ))
}
