// src/routes/mod.rs

use crate::{
    handlers::{
        bulletin::{
            archive_bulletins, deliver_bulletin, download_bulletin_pdf, generate_batch,
            generate_bulletin, get_bulletin, list_deliveries,
        },
        rules::{get_rules, preview_contributions},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // ─── Rules ────────────────────────────────────────────
        .route("/rules", get(get_rules))
        .route("/contributions/preview", post(preview_contributions))
        // ─── Bulletins ────────────────────────────────────────
        .route("/bulletins", post(generate_bulletin))
        .route("/bulletins/batch", post(generate_batch))
        .route("/bulletins/archive", post(archive_bulletins))
        .route("/bulletins/{bulletin_id}", get(get_bulletin))
        .route("/bulletins/{bulletin_id}/pdf", get(download_bulletin_pdf))
        // ─── Delivery ─────────────────────────────────────────
        .route("/bulletins/{bulletin_id}/deliver", post(deliver_bulletin))
        .route("/bulletins/{bulletin_id}/deliveries", get(list_deliveries))
}
