use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use ore_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::payment_objects::ProviderKind;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

#[derive(Debug, Clone, Error)]
#[error("The order is too large: {0} does not fit in a money amount")]
pub struct OrderTotalOverflow(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh, random order id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   PaymentMethod     ---------------------------------------------------------
/// How the customer chose to pay. Fixed when the order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    MoMo,
    Card,
    PayPal,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::MoMo => write!(f, "MoMo"),
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::PayPal => write!(f, "PayPal"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "momo" => Ok(Self::MoMo),
            "card" => Ok(Self::Card),
            "paypal" => Ok(Self::PayPal),
            _ => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// No terminal signal has been received from the payment provider yet.
    Pending,
    /// The provider confirmed the payment. This is never downgraded.
    Paid,
    /// The provider reported a failed payment. A later successful payment can still move the order to `Paid`.
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Paid => write!(f, "PAID"),
            PaymentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been placed, and is waiting for payment.
    Pending,
    /// Payment has been received in full.
    Paid,
    /// The order is on its way to the customer.
    Shipped,
    /// The order has reached the customer.
    Delivered,
    /// The order has been cancelled by an admin. This status is absorbing.
    Cancelled,
}

impl OrderStatusType {
    /// Position on the forward path `Pending → Paid → Shipped → Delivered`. `Cancelled` is off the path.
    pub fn progress(&self) -> Option<u8> {
        match self {
            OrderStatusType::Pending => Some(0),
            OrderStatusType::Paid => Some(1),
            OrderStatusType::Shipped => Some(2),
            OrderStatusType::Delivered => Some(3),
            OrderStatusType::Cancelled => None,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "PENDING"),
            OrderStatusType::Paid => write!(f, "PAID"),
            OrderStatusType::Shipped => write!(f, "SHIPPED"),
            OrderStatusType::Delivered => write!(f, "DELIVERED"),
            OrderStatusType::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------   ShippingStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingStatus {
    NotShipped,
    /// Sellers sometimes report this as `SHIPPED`; both spellings map here.
    #[serde(alias = "SHIPPED")]
    InTransit,
    Delivered,
}

impl Display for ShippingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShippingStatus::NotShipped => write!(f, "NOT_SHIPPED"),
            ShippingStatus::InTransit => write!(f, "IN_TRANSIT"),
            ShippingStatus::Delivered => write!(f, "DELIVERED"),
        }
    }
}

impl FromStr for ShippingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NOT_SHIPPED" => Ok(Self::NotShipped),
            "IN_TRANSIT" | "SHIPPED" => Ok(Self::InTransit),
            "DELIVERED" => Ok(Self::Delivered),
            _ => Err(ConversionError(format!("Invalid shipping status: {s}"))),
        }
    }
}

//--------------------------------------    OrderStatuses    ---------------------------------------------------------
/// The three status fields of an order that must be kept consistent with each other.
///
/// Store updates are conditioned on the previously read value of this triple (compare-and-swap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatuses {
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatusType,
    pub shipping_status: ShippingStatus,
}

impl Display for OrderStatuses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "payment: {}, order: {}, shipping: {}", self.payment_status, self.order_status, self.shipping_status)
    }
}

//--------------------------------------       Product       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub price: Money,
    pub stock: i64,
}

impl Product {
    pub fn new<S: Into<String>>(id: S, seller_id: S, name: S, price: Money, stock: i64) -> Self {
        Self { id: id.into(), seller_id: seller_id.into(), name: name.into(), price, stock }
    }
}

//--------------------------------------       CartItem      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: i64,
}

impl CartItem {
    pub fn new<S: Into<String>>(product_id: S, quantity: i64) -> Self {
        Self { product_id: product_id.into(), quantity }
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// A line item, captured from the catalog when the order is placed. It is never re-derived from the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub seller_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub price_at_purchase: Money,
}

impl OrderItem {
    /// `price_at_purchase × quantity`, or `None` if that overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.price_at_purchase.checked_mul(self.quantity)
    }
}

//--------------------------------------     ShippingInfo    ---------------------------------------------------------
/// Shipping details as submitted by the customer at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShippingInfo {
    pub full_name: String,
    pub phone: String,
    pub city: String,
    pub address_line: String,
}

impl NewShippingInfo {
    pub fn new<S: Into<String>>(full_name: S, phone: S, city: S, address_line: S) -> Self {
        Self { full_name: full_name.into(), phone: phone.into(), city: city.into(), address_line: address_line.into() }
    }

    /// Returns the names of any fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("city", &self.city),
            ("address_line", &self.address_line),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub full_name: String,
    pub phone: String,
    pub city: String,
    pub address_line: String,
    pub status: ShippingStatus,
}

//--------------------------------------    PaymentDetails   ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// The provider's reference for the payment session. Unique across orders.
    pub transaction_id: Option<String>,
    /// The provider that opened the current session.
    pub provider: Option<ProviderKind>,
    pub payment_date: Option<DateTime<Utc>>,
    /// Provider name and the last status string the provider reported.
    pub payment_info: Option<String>,
}

//--------------------------------------       Customer      ---------------------------------------------------------
/// The purchasing user, as vouched for by the (external) authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
}

impl Customer {
    pub fn new<S: Into<String>>(id: S, email: S) -> Self {
        Self { id: id.into(), email: email.into() }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub customer_email: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total_price: Money,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatusType,
    pub shipping: ShippingInfo,
    pub payment_details: PaymentDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn statuses(&self) -> OrderStatuses {
        OrderStatuses {
            payment_status: self.payment_status,
            order_status: self.order_status,
            shipping_status: self.shipping.status,
        }
    }

    /// The key used to correlate provider events with this order: the provider transaction id if there is one,
    /// otherwise the order id itself.
    pub fn correlation_id(&self) -> &str {
        self.payment_details.transaction_id.as_deref().unwrap_or(self.id.as_str())
    }
}

//--------------------------------------       NewOrder      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total_price: Money,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub shipping: NewShippingInfo,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Builds a new order from a set of line items. The subtotal and total are derived here, and nowhere else.
    pub fn new(
        customer: Customer,
        items: Vec<OrderItem>,
        shipping_fee: Money,
        currency: &str,
        payment_method: PaymentMethod,
        shipping: NewShippingInfo,
    ) -> Result<Self, OrderTotalOverflow> {
        let subtotal = items.iter().try_fold(Money::default(), |acc, item| {
            let line = item
                .line_total()
                .ok_or_else(|| OrderTotalOverflow(format!("{} x {}", item.quantity, item.price_at_purchase)))?;
            acc.checked_add(line).ok_or_else(|| OrderTotalOverflow("the subtotal".to_string()))
        })?;
        let total_price =
            subtotal.checked_add(shipping_fee).ok_or_else(|| OrderTotalOverflow("the total price".to_string()))?;
        Ok(Self {
            id: OrderId::random(),
            customer,
            items,
            subtotal,
            shipping_fee,
            total_price,
            currency: currency.to_string(),
            payment_method,
            shipping,
            created_at: Utc::now(),
        })
    }
}

//--------------------------------------     ShippingRate    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShippingRate {
    pub id: i64,
    pub city: String,
    pub fee: Money,
    pub is_default: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShippingRate {
    pub city: String,
    pub fee: Money,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

impl NewShippingRate {
    pub fn new<S: Into<String>>(city: S, fee: Money) -> Self {
        Self { city: city.into(), fee, is_default: false, is_active: true }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
