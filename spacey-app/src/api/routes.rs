use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use spacey_core::{
    CardEvent, CardEventReq, CardEventRes, DeckProbabilitiesReq, DeckRecallProbability,
    EventUsecase, LearningSession, LearningSessionCreateReq, LearningSessionUpdateReq,
    SessionUsecase,
};

use crate::api::dto::{
    body, require_user, ApiError, HistoryQuery, IdOut, SessionQuery, UserQuery,
};

#[derive(Clone)]
pub struct AppState {
    pub events: Arc<EventUsecase>,
    pub sessions: Arc<SessionUsecase>,
}

pub async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// `GET /events?userID=..&ids=a&ids=b`
pub async fn learning_cards(
    State(st): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<CardEventRes>>, ApiError> {
    let mut user_id = None;
    let mut ids = Vec::new();
    for (k, v) in params {
        match k.as_str() {
            "userID" => user_id = Some(v),
            "ids" => ids.push(v),
            _ => {}
        }
    }
    let user_id = require_user(user_id)?;
    let cards = st.events.get_learning_cards(&user_id, &ids).await?;
    Ok(Json(cards))
}

pub async fn create_card_event(
    State(st): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
    payload: Result<Json<CardEventReq>, JsonRejection>,
) -> Result<(StatusCode, Json<IdOut>), ApiError> {
    let user_id = q.require()?;
    let req = body(payload)?;
    req.validate()?;
    let id = st.events.create_card_event(&user_id, &req).await?;
    Ok((StatusCode::CREATED, Json(IdOut { id })))
}

pub async fn card_history(
    State(st): State<Arc<AppState>>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<CardEvent>>, ApiError> {
    let user_id = require_user(q.user_id)?;
    let card_id = q
        .card_id
        .ok_or_else(|| ApiError::BadRequest("cardID is required".into()))?;
    Ok(Json(st.events.card_history(&user_id, &card_id).await?))
}

pub async fn deck_probabilities(
    State(st): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
    payload: Result<Json<Vec<DeckProbabilitiesReq>>, JsonRejection>,
) -> Result<Json<Vec<DeckRecallProbability>>, ApiError> {
    let user_id = q.require()?;
    let decks = body(payload)?;
    Ok(Json(st.events.deck_recall_probabilities(&user_id, &decks).await?))
}

pub async fn create_session(
    State(st): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
    payload: Result<Json<LearningSessionCreateReq>, JsonRejection>,
) -> Result<(StatusCode, Json<IdOut>), ApiError> {
    let user_id = q.require()?;
    let req = body(payload)?;
    let id = st.sessions.create_learning_session(&user_id, &req).await?;
    Ok((StatusCode::CREATED, Json(IdOut { id })))
}

pub async fn finish_session(
    State(st): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
    payload: Result<Json<LearningSessionUpdateReq>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let user_id = q.require()?;
    let req = body(payload)?;
    st.sessions.finish_learning_session(&user_id, &req).await?;
    Ok(StatusCode::OK)
}

pub async fn get_session(
    State(st): State<Arc<AppState>>,
    Query(q): Query<SessionQuery>,
) -> Result<Json<LearningSession>, ApiError> {
    let user_id = require_user(q.user_id)?;
    Ok(Json(st.sessions.get_learning_session(&user_id, q.id).await?))
}
