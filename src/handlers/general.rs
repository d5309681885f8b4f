use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};
use serde_json::json;

/// Root handler, an HTML landing page listing the routes
pub async fn root_handler() -> impl IntoResponse {
    Html(r#"<!DOCTYPE html>
<html lang="fr">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0"/>
  <title>Paie Maroc API</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: 'Segoe UI', system-ui, sans-serif; background: #0f172a; color: #e2e8f0; min-height: 100vh; padding: 40px 20px; }
    .container { max-width: 860px; margin: 0 auto; }
    header { text-align: center; margin-bottom: 48px; }
    header h1 { font-size: 2.6rem; font-weight: 800; color: #34d399; margin-bottom: 8px; }
    header p { color: #94a3b8; font-size: 1.1rem; }
    .grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(260px, 1fr)); gap: 16px; margin-bottom: 32px; }
    .card { background: #1e293b; border: 1px solid #334155; border-radius: 12px; padding: 20px; }
    .card h3 { font-size: 1rem; font-weight: 600; color: #f1f5f9; margin-bottom: 6px; }
    .card p { font-size: 0.875rem; color: #94a3b8; line-height: 1.5; }
    .card a { color: #38bdf8; text-decoration: none; display: inline-block; margin-top: 8px; font-size: 0.875rem; }
    .routes { background: #1e293b; border: 1px solid #334155; border-radius: 12px; padding: 24px; }
    .route-group { margin-bottom: 20px; }
    .route-group h4 { font-size: 0.8rem; text-transform: uppercase; letter-spacing: 0.1em; color: #64748b; margin-bottom: 8px; }
    .route-item { display: flex; gap: 12px; padding: 8px 0; border-bottom: 1px solid #0f172a; }
    .method { font-size: 0.7rem; font-weight: 700; padding: 2px 8px; border-radius: 4px; min-width: 52px; text-align: center; font-family: monospace; }
    .get { background: #064e3b; color: #34d399; }
    .post { background: #1e3a5f; color: #60a5fa; }
    .route-path { font-family: monospace; font-size: 0.85rem; flex: 1; }
    .route-desc { font-size: 0.8rem; color: #64748b; }
  </style>
</head>
<body>
<div class="container">
  <header>
    <h1>Paie Maroc API</h1>
    <p>Calcul CNSS, AMO, IR et génération des bulletins de paie</p>
  </header>

  <div class="grid">
    <div class="card">
      <h3>Documentation</h3>
      <p>Swagger UI with every endpoint and schema.</p>
      <a href="/docs">Open Swagger UI</a>
    </div>
    <div class="card">
      <h3>Health</h3>
      <p>Service status and storage connectivity.</p>
      <a href="/health">GET /health</a>
    </div>
  </div>

  <div class="routes">
    <div class="route-group">
      <h4>Rules</h4>
      <div class="route-item"><span class="method get">GET</span><span class="route-path">/api/v1/rules?date=YYYY-MM-DD</span><span class="route-desc">Rule table in effect</span></div>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/contributions/preview</span><span class="route-desc">CNSS, AMO, CIMR and IR for a salary</span></div>
    </div>
    <div class="route-group">
      <h4>Bulletins</h4>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/bulletins</span><span class="route-desc">Generate one bulletin</span></div>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/bulletins/batch</span><span class="route-desc">Generate a period and return a ZIP</span></div>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/bulletins/archive</span><span class="route-desc">ZIP of persisted bulletins</span></div>
      <div class="route-item"><span class="method get">GET</span><span class="route-path">/api/v1/bulletins/{bulletin_id}</span><span class="route-desc">Get a bulletin</span></div>
      <div class="route-item"><span class="method get">GET</span><span class="route-path">/api/v1/bulletins/{bulletin_id}/pdf</span><span class="route-desc">Download as PDF</span></div>
    </div>
    <div class="route-group">
      <h4>Delivery</h4>
      <div class="route-item"><span class="method post">POST</span><span class="route-path">/api/v1/bulletins/{bulletin_id}/deliver</span><span class="route-desc">Email to the employee</span></div>
      <div class="route-item"><span class="method get">GET</span><span class="route-path">/api/v1/bulletins/{bulletin_id}/deliveries</span><span class="route-desc">Delivery history</span></div>
    </div>
  </div>
</div>
</body>
</html>"#)
}

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = &state.pipeline;
    match pipeline.check_storage().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "storage": pipeline.storage_backend(),
                "renderer": pipeline.template_version(),
                "service": "payroll-ma",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "storage": pipeline.storage_backend(),
                "error": e.to_string()
            })),
        ),
    }
}
