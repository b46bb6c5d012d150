use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use spacey_core::{CoreError, SessionId};

#[derive(Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

impl UserQuery {
    pub fn require(self) -> Result<String, ApiError> {
        require_user(self.user_id)
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
    #[serde(rename = "cardID")]
    pub card_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
    pub id: SessionId,
}

#[derive(Serialize, Deserialize)]
pub struct IdOut {
    pub id: uuid::Uuid,
}

#[derive(Serialize)]
struct ErrorOut {
    error: String,
}

pub fn require_user(user_id: Option<String>) -> Result<String, ApiError> {
    user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("userID is required".into()))
}

/// Unwraps a JSON body, answering 400 instead of axum's 422 on bad input.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Core(CoreError),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Core(e) => {
                let status = match e {
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Invalid(_) => StatusCode::BAD_REQUEST,
                    CoreError::Conflict(_) => StatusCode::CONFLICT,
                    CoreError::Storage(_) | CoreError::Timeout(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
        };
        (status, Json(ErrorOut { error })).into_response()
    }
}
