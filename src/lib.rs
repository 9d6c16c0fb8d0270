pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod platform;
pub mod ports;
pub mod services;
pub mod startup;
pub mod stellar;
pub mod utils;
pub mod validation;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::adapters::Storage;
use crate::services::{AssetRegistrar, JobQueue};
use crate::stellar::Ledger;

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub ledger: Arc<dyn Ledger>,
    pub registrar: AssetRegistrar,
    pub jobs: JobQueue,
    pub network: String,
    pub wallet_domain: String,
    pub adapter_secret_key: String,
}

pub fn create_app(state: AppState, request_timeout: Duration) -> Router {
    let webhooks = Router::new()
        .route("/send/", post(handlers::adapter::send))
        .route("/user/account/", post(handlers::adapter::user_account))
        .route("/assets/add/", post(handlers::adapter::add_asset))
        .route("/operating/balance/", get(handlers::adapter::operating_balance))
        .route("/operating/account/", get(handlers::adapter::operating_account))
        .route("/purchase/", post(handlers::adapter::acknowledge))
        .route("/withdraw/", post(handlers::adapter::acknowledge))
        .route("/deposit/", post(handlers::adapter::acknowledge))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::adapter_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(webhooks)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(from_fn(middleware::request_logger::request_logger_middleware))
        .with_state(state)
}
