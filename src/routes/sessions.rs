//! # 출석 세션 API 라우트 핸들러
//!
//! 세션 소유자(교사)가 사용하는 HTTP 핸들러 함수들입니다.
//! 모든 핸들러는 Bearer 토큰이 필요합니다 (`AuthUser` 추출기).
//!
//! ## 엔드포인트 목록
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | POST | /api/v1/sessions | `open_session` | 새 세션 열기 (기존 활성 세션 대체) |
//! | GET | /api/v1/sessions | `list_sessions` | 내 세션 이력 |
//! | GET | /api/v1/sessions/{id} | `get_session` | 세션 하나 (활성이면 QR 포함) |
//! | POST | /api/v1/sessions/{id}/close | `close_session` | 세션 종료 |
//! | POST | /api/v1/sessions/{id}/rotate | `rotate_code` | 코드 회전 |
//! | GET | /api/v1/sessions/{id}/attendance | `attendance` | 실시간 출석 현황 |
//!
//! ## 사용 흐름
//! ```text
//! 1. 수업 시작 → POST /sessions (PIN + QR 발급)
//! 2. 화면에 PIN/QR 표시, GET /sessions/{id}/attendance?after=<cursor> 로 폴링
//! 3. 코드가 유출되면 → POST /sessions/{id}/rotate
//! 4. 수업 종료 → POST /sessions/{id}/close
//! ```

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::*,
    routes::AppState,
    services::{lifecycle, observer},
};

/// `POST /sessions`: 새 출석 세션을 엽니다.
///
/// 같은 소유자의 활성 세션은 새 세션으로 대체되어 닫힙니다.
/// 본문이 잘못된 JSON이면 axum 기본 거절 대신 `invalid_input` 400으로 응답합니다.
pub async fn open_session(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<OpenSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let Json(req) = body.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let opened =
        lifecycle::open_session(&state.pool, &state.authz, &state.codes, &user, req).await?;
    Ok((StatusCode::CREATED, Json(opened)))
}

/// `GET /sessions` → `{ "sessions": [...] }`
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let sessions = lifecycle::list_sessions(&state.pool, &user).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session =
        lifecycle::get_session(&state.pool, &state.authz, &state.codes, &user, &id).await?;
    Ok(Json(session))
}

/// `POST /sessions/{id}/close`: 세션을 닫습니다.
///
/// 이미 닫힌 세션에 다시 호출해도 같은 결과를 돌려줍니다.
pub async fn close_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<AttendanceSession>, AppError> {
    let session = lifecycle::close_session(&state.pool, &state.authz, &user, &id).await?;
    Ok(Json(session))
}

/// `POST /sessions/{id}/rotate`: 새 PIN과 QR을 발급합니다.
///
/// 이전 PIN과 이전 QR은 즉시 무효가 되고, 기록된 출석은 유지됩니다.
pub async fn rotate_code(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let rotated =
        lifecycle::rotate_code(&state.pool, &state.authz, &state.codes, &user, &id).await?;
    Ok(Json(rotated))
}

/// `GET /sessions/{id}/attendance?after=<cursor>`: 출석 현황을 조회합니다.
///
/// 폴링하는 화면은 직전 응답의 `cursor`를 `after`로 넘기면
/// 새로 출석한 학생만 받아볼 수 있습니다.
pub async fn attendance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> Result<Json<AttendanceSnapshot>, AppError> {
    let Query(query) = query.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let snapshot = observer::poll(&state.pool, &state.authz, &user, &id, query).await?;
    Ok(Json(snapshot))
}
