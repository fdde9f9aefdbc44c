mod health;
mod index;
mod metrics;
mod upload;
mod uploaded_file;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub use health::healthcheck;
pub use index::index;
pub use metrics::metrics_handler;
pub use upload::upload;
pub use uploaded_file::uploaded_file;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/static/uploads/{file}", get(uploaded_file))
        .route("/health", get(healthcheck))
        .route("/metrics", get(metrics_handler))
}
