use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use log::*;
use ore_engine::{db_types::OrderId, traits::ReconciliationDatabase, ShippingApi, SqliteDatabase};

use crate::support::Harness;

#[derive(Default, Debug, World)]
pub struct ReconciliationWorld {
    pub system: Option<ReconciliationSystem>,
}

impl ReconciliationWorld {
    pub fn system(&mut self) -> &mut ReconciliationSystem {
        self.system.as_mut().expect("System not initialised. Did you forget 'Given a fresh install'?")
    }
}

pub struct ReconciliationSystem {
    pub harness: Harness,
    /// The most recent order placed by each customer.
    pub orders: HashMap<String, OrderId>,
    pub last_error: Option<String>,
    pub confirmations: usize,
    pub deliveries: usize,
}

impl Debug for ReconciliationSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationSystem({})", self.db_path())
    }
}

impl ReconciliationSystem {
    pub async fn new() -> Self {
        let harness = Harness::new().await;
        debug!("Created database: {}", harness.db.url());
        Self { harness, orders: HashMap::new(), last_error: None, confirmations: 0, deliveries: 0 }
    }

    pub fn db_path(&self) -> &str {
        self.harness.db.url()
    }

    pub fn shipping(&self) -> ShippingApi<SqliteDatabase> {
        ShippingApi::new(self.harness.db.clone())
    }

    pub fn order_for(&self, customer: &str) -> OrderId {
        self.orders.get(customer).cloned().unwrap_or_else(|| panic!("Customer {customer} has not placed an order"))
    }

    /// Drains the event channels and returns the running totals.
    pub fn notifications(&mut self) -> (usize, usize) {
        self.confirmations += self.harness.confirmed_count();
        self.deliveries += self.harness.delivered_count();
        (self.confirmations, self.deliveries)
    }
}
