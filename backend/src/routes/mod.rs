//! API route definitions
//!
//! Everything under /api/v1 requires a valid JWT carrying the warehouse
//! (tenant) id.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::middleware::auth_middleware;
use crate::AppState;

/// All /api/v1 routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/items", item_routes())
        .nest("/batches", batch_routes())
        .nest("/bins", bin_routes())
        .nest("/receipts", receiving_routes())
        .nest("/placements", placement_routes())
        .nest("/transfers", transfer_routes())
        .nest("/transfer-orders", transfer_order_routes())
        .nest("/damage-reports", damage_routes())
        .nest("/stock-counts", stock_count_routes())
        .route_layer(middleware::from_fn(auth_middleware))
        .route("/health", get(handlers::health::health_check))
}

fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::item::create_item).get(handlers::item::list_items))
        .route("/:id", get(handlers::item::get_item))
}

fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::batch::create_batch))
        .route("/deduct", post(handlers::batch::deduct_stock))
        .route("/item/:item_id", get(handlers::batch::list_batches_for_item))
        .route("/:id/deductions", get(handlers::batch::list_batch_deductions))
}

fn bin_routes() -> Router<AppState> {
    Router::new()
        .route("/allocate", post(handlers::bin::allocate))
        .route("/deallocate", post(handlers::bin::deallocate))
        .route("/item/:item_id", get(handlers::bin::list_allocations_for_item))
        .route("/:bin", get(handlers::bin::list_allocations_in_bin))
}

fn receiving_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::receiving::receive).get(handlers::receiving::list_receipts),
        )
        .route("/:id", get(handlers::receiving::get_receipt))
}

fn placement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::placement::create_from_receipt).get(handlers::placement::list_placements),
        )
        .route("/:id", get(handlers::placement::get_placement))
        .route("/:id/place", put(handlers::placement::place_item))
}

fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::transfer::create_transfer).get(handlers::transfer::list_transfers),
        )
        .route("/:id", get(handlers::transfer::get_transfer))
        .route("/:id/begin", put(handlers::transfer::begin_transfer))
        .route("/:id/step", put(handlers::transfer::advance_transfer_step))
        .route("/:id/complete", put(handlers::transfer::complete_transfer))
}

fn transfer_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::transfer::create_transfer_order))
        .route("/:id/tasks", post(handlers::transfer::create_tasks_from_order))
}

fn damage_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::damage::create_damage_report).get(handlers::damage::list_damage_reports),
        )
        .route("/:id", get(handlers::damage::get_damage_report))
        .route("/:id/approve", put(handlers::damage::approve_damage_report))
        .route("/:id/reject", put(handlers::damage::reject_damage_report))
}

fn stock_count_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::stock_count::create_stock_count)
                .get(handlers::stock_count::list_stock_counts),
        )
        .route("/:id", get(handlers::stock_count::get_stock_count))
        .route("/:id/start", put(handlers::stock_count::start_stock_count))
        .route("/:id/record", post(handlers::stock_count::record_count))
        .route("/:id/submit", put(handlers::stock_count::submit_stock_count))
        .route("/:id/approve", put(handlers::stock_count::approve_stock_count))
        .route("/:id/reject", put(handlers::stock_count::reject_stock_count))
        .route("/:id/recount", put(handlers::stock_count::recount_stock_count))
        .route("/:id/complete", put(handlers::stock_count::complete_stock_count))
}
