use axum::Json;

use crate::jsonrpc::dispatcher::{Dispatcher, MethodListing};

/// Every typed method, sorted, plus the same names grouped by category.
pub async fn list_methods_handler() -> Json<MethodListing> {
    Json(Dispatcher::method_listing())
}
