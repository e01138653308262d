use std::sync::Arc;

use crate::{
    currency::ExchangeRates,
    db::{DbPool, OrmConn},
    realtime::FavoriteEventBus,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub events: FavoriteEventBus,
    pub rates: Arc<ExchangeRates>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        orm: OrmConn,
        events: FavoriteEventBus,
        rates: ExchangeRates,
        jwt_secret: &str,
    ) -> Self {
        Self {
            pool,
            orm,
            events,
            rates: Arc::new(rates),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
