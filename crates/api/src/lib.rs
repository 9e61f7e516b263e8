//! HTTP API server with observability for the farm stock ledger.
//!
//! Provides REST endpoints for farm records, the stock transactions and
//! reports, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use document_store::DocumentStore;
use domain::{
    Expense, ExpensePatch, FarmService, Field, FieldPatch, Fumigation, FumigationPatch, Harvest,
    HarvestPatch, Product, ProductPatch, Purchase, PurchasePatch, Transfer, User, UserPatch,
    Warehouse, WarehousePatch,
};
use metrics_exporter_prometheus::PrometheusHandle;
use reports::ReportService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::{fumigations, harvests, products, records, reports as report_routes, system, transfers};

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore + Clone> {
    pub farm: Arc<FarmService<S>>,
    pub reports: ReportService<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(system::health::<S>))
        .route("/activity", get(system::activity::<S>))
        .route(
            "/products",
            get(products::list::<S>).post(products::create::<S>),
        )
        .route("/products/low-stock", get(products::low_stock::<S>))
        .route(
            "/products/{id}",
            get(records::get::<S, Product>)
                .patch(records::update::<S, Product, ProductPatch>)
                .delete(records::delete::<S, Product>),
        )
        .route("/products/{id}/adjust", post(products::adjust::<S>))
        .route(
            "/fumigations",
            get(records::list::<S, Fumigation>).post(fumigations::create::<S>),
        )
        .route(
            "/fumigations/{id}",
            get(records::get::<S, Fumigation>)
                .patch(records::update::<S, Fumigation, FumigationPatch>)
                .delete(records::delete::<S, Fumigation>),
        )
        .route("/fumigations/{id}/complete", post(fumigations::complete::<S>))
        .route(
            "/fumigations/{id}/status",
            post(records::update_status::<S, Fumigation>),
        )
        .route(
            "/harvests",
            get(records::list::<S, Harvest>).post(harvests::create::<S>),
        )
        .route(
            "/harvests/{id}",
            get(records::get::<S, Harvest>)
                .patch(records::update::<S, Harvest, HarvestPatch>)
                .delete(records::delete::<S, Harvest>),
        )
        .route("/harvests/{id}/complete", post(harvests::complete::<S>))
        .route(
            "/harvests/{id}/status",
            post(records::update_status::<S, Harvest>),
        )
        .route(
            "/transfers",
            get(records::list::<S, Transfer>).post(transfers::create::<S>),
        )
        .route("/transfers/{id}", get(records::get::<S, Transfer>))
        .route("/transfers/{id}/complete", post(transfers::complete::<S>))
        .route(
            "/transfers/{id}/status",
            post(records::update_status::<S, Transfer>),
        )
        .merge(records::collection::<S, Field, FieldPatch>())
        .merge(records::collection::<S, Warehouse, WarehousePatch>())
        .merge(records::collection::<S, Purchase, PurchasePatch>())
        .merge(records::collection::<S, Expense, ExpensePatch>())
        .merge(records::collection::<S, User, UserPatch>())
        .route("/reports", get(report_routes::index))
        .route("/reports/{kind}", get(report_routes::build::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`, configured from `config`.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let farm = Arc::new(FarmService::new(store).with_policy(config.stock_policy()));
    let reports = ReportService::new(farm.clone());
    Arc::new(AppState { farm, reports })
}
