use std::{env, time::Duration};

use log::*;
use ore_common::{parse_boolean_flag, DEFAULT_CURRENCY_CODE};
use ore_engine::{
    db_types::PaymentMethod,
    db_url,
    providers::sandbox::{DEFAULT_SANDBOX_DELAY, DEFAULT_SANDBOX_METHODS},
};
use payment_providers::{MomoConfig, StripeConfig};

const DEFAULT_ORE_HOST: &str = "127.0.0.1";
const DEFAULT_ORE_PORT: u16 = 8370;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The currency every price in the shop is quoted in.
    pub currency: String,
    pub sandbox: SandboxConfig,
    pub momo: MomoConfig,
    pub stripe: StripeConfig,
}

/// Payment simulation for methods that have no provider integration.
#[derive(Clone, Debug)]
pub struct SandboxConfig {
    /// When true, every new order paid with one of `methods` gets a sandbox payment session that confirms itself
    /// after `delay`. The sandbox webhook is only served while this is on.
    pub auto_confirm: bool,
    pub delay: Duration,
    pub methods: Vec<PaymentMethod>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self { auto_confirm: true, delay: DEFAULT_SANDBOX_DELAY, methods: DEFAULT_SANDBOX_METHODS.to_vec() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ORE_HOST.to_string(),
            port: DEFAULT_ORE_PORT,
            database_url: String::default(),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            sandbox: SandboxConfig::default(),
            momo: MomoConfig::default(),
            stripe: StripeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("ORE_HOST").ok().unwrap_or_else(|| DEFAULT_ORE_HOST.into());
        let port = env::var("ORE_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for ORE_PORT. {e} Using the default, {DEFAULT_ORE_PORT}, instead."
                    );
                    DEFAULT_ORE_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_ORE_PORT);
        let database_url = db_url();
        let currency = env::var("ORE_CURRENCY")
            .ok()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        let sandbox = SandboxConfig::from_env_or_default();
        let momo = MomoConfig::new_from_env_or_default();
        let stripe = StripeConfig::new_from_env_or_default();
        Self { host, port, database_url, currency, sandbox, momo, stripe }
    }
}

impl SandboxConfig {
    pub fn from_env_or_default() -> Self {
        let auto_confirm = parse_boolean_flag(env::var("ORE_SANDBOX_AUTO_CONFIRM").ok(), true);
        let delay = parse_delay(env::var("ORE_SANDBOX_DELAY_SECS").ok());
        let methods = parse_methods(env::var("ORE_SANDBOX_METHODS").ok());
        if auto_confirm && !methods.is_empty() {
            let names = methods.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            warn!(
                "🚨️ Sandbox auto-confirm is ON for {names}. New orders paid this way will be marked as paid after {}s \
                 without any money changing hands. 🚨️",
                delay.as_secs()
            );
        }
        Self { auto_confirm, delay, methods }
    }
}

fn parse_methods(value: Option<String>) -> Vec<PaymentMethod> {
    let Some(value) = value else {
        return DEFAULT_SANDBOX_METHODS.to_vec();
    };
    let mut methods = Vec::new();
    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<PaymentMethod>() {
            Ok(m) if !methods.contains(&m) => methods.push(m),
            Ok(_) => {},
            Err(e) => warn!("🪛️ Ignoring {name} in ORE_SANDBOX_METHODS. {e}"),
        }
    }
    methods
}

fn parse_delay(value: Option<String>) -> Duration {
    let Some(value) = value else {
        info!("🪛️ ORE_SANDBOX_DELAY_SECS is not set. Using the default of {}s.", DEFAULT_SANDBOX_DELAY.as_secs());
        return DEFAULT_SANDBOX_DELAY;
    };
    value.trim().parse::<u64>().map(Duration::from_secs).unwrap_or_else(|e| {
        warn!("🪛️ Invalid configuration value for ORE_SANDBOX_DELAY_SECS ({value}). {e}. Using the default.");
        DEFAULT_SANDBOX_DELAY
    })
}
