//! Status page
//!
//! A single `GET /` route rendering what the bot has done since it started.
//! Only successful posts are recorded, so failures never show up here; they
//! live in the logs.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::bot::SharedState;
use crate::error::Result;
use crate::identity::profile_url;

/// Static facts shown next to the live bot state
#[derive(Clone)]
pub struct StatusPage {
    pub bot_npub: String,
    pub author_npub: Option<String>,
    pub relays: Vec<String>,
    pub state: SharedState,
}

pub fn router(page: StatusPage) -> Router {
    Router::new()
        .route("/", get(index))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(page))
}

/// Serve the status page until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, page: StatusPage, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(page))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn index(State(page): State<Arc<StatusPage>>) -> Html<String> {
    let state = page.state.read().await.clone();
    Html(render(&page, &state.history, state.started_at, Utc::now()))
}

/// Uptime as `DdHhMmSs`, e.g. `1d2h3m4s`
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{}d{}h{}m{}s", days, hours, minutes, seconds)
}

fn profile_link(npub: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        encode_double_quoted_attribute(&profile_url(npub)),
        encode_text(npub)
    )
}

pub fn render(
    page: &StatusPage,
    history: &[crate::types::PostRecord],
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>gmcast</title></head>\n<body>\n",
    );

    html.push_str("<h1>Bot is running!</h1>\n");

    if let Some(author) = &page.author_npub {
        html.push_str(&format!("<p>Author: {}</p>\n", profile_link(author)));
    }
    html.push_str(&format!("<p>Bot: {}</p>\n", profile_link(&page.bot_npub)));
    html.push_str(&format!(
        "<p>Uptime: {}</p>\n",
        format_uptime(now - started_at)
    ));

    html.push_str("<h2>Relays</h2>\n<ul>\n");
    for relay in &page.relays {
        html.push_str(&format!("<li>{}</li>\n", encode_text(relay)));
    }
    html.push_str("</ul>\n");

    html.push_str("<h2>Posts</h2>\n");
    if history.is_empty() {
        html.push_str("<p>No posts yet.</p>\n");
    } else {
        html.push_str("<ul>\n");
        for record in history.iter().rev() {
            html.push_str(&format!(
                "<li><time>{}</time> {}</li>\n",
                record.posted_at.format("%Y-%m-%d %H:%M:%S UTC"),
                encode_text(&record.content)
            ));
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}
