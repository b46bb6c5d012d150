use axum::{
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::routes::{
    card_history, create_card_event, create_session, deck_probabilities, finish_session,
    get_session, learning_cards, ping, AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/events", get(learning_cards))
        .route("/event", post(create_card_event))
        .route("/history", get(card_history))
        .route("/probabilities", post(deck_probabilities))
        .route(
            "/session",
            post(create_session).put(finish_session).get(get_session),
        )
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "learning service listening");
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
