//! Embedded status page.
//!
//! `GET /` — the browser UI. A single static page that renders the
//! `/api/tracker` view verbatim (all formatting happens server-side) and
//! refreshes on `/api/events`.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../ui/index.html");

/// `GET /` — serve the embedded page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
