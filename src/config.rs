use std::env;

use crate::currency::{Currency, ExchangeRates};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub base_currency: Currency,
    pub exchange_rates: ExchangeRates,
    pub realtime_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let base_currency = match env::var("BASE_CURRENCY") {
            Ok(code) => code.parse::<Currency>()?,
            Err(_) => Currency::Usd,
        };
        let exchange_rates = match env::var("EXCHANGE_RATES") {
            Ok(spec) => ExchangeRates::parse(base_currency, &spec)?,
            Err(_) => ExchangeRates::default_for(base_currency),
        };

        let realtime_capacity = env::var("REALTIME_CAPACITY")
            .ok()
            .and_then(|c| c.parse::<usize>().ok())
            .filter(|c| *c > 0)
            .unwrap_or(1024);

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            base_currency,
            exchange_rates,
            realtime_capacity,
        })
    }
}
