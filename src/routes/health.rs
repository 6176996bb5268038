//! # 헬스체크(Health Check) 핸들러
//!
//! ## 엔드포인트
//! - `GET /api/v1/health` → `{ "status": "ok" }` 또는 503 `{ "status": "degraded" }`
//!
//! 로드밸런서나 컨테이너 오케스트레이터가 서버 상태를 확인할 때 사용합니다.
//! 출석 기록의 권위는 DB에 있으므로, DB에 닿지 않으면 서버가 떠 있어도 degraded로 보고합니다.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

/// `GET /health`: 서버와 DB 연결 상태를 확인합니다.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded" })),
            )
        }
    }
}
