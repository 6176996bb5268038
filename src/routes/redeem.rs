//! # 출석 처리 핸들러
//!
//! ## 엔드포인트
//! - `POST /api/v1/redeem` + `{ "code": "...", "presented_identity_token": "...", "display_name": "..." }`
//!
//! 학생은 계정 토큰 없이 호출합니다. 코드를 아는 것과 신원 토큰이 곧 자격입니다.
//! 실패는 모두 `{"error": {"code", "message"}}` 형태로 돌아오며 `code`로 원인을 구분합니다.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::{
    error::AppError,
    models::{RedeemReceipt, RedeemRequest},
    routes::AppState,
    services::redemption,
};

pub async fn redeem(
    State(state): State<AppState>,
    body: Result<Json<RedeemRequest>, JsonRejection>,
) -> Result<Json<RedeemReceipt>, AppError> {
    let Json(req) = body.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let receipt = redemption::redeem(
        &state.pool,
        &state.roster,
        &state.codes,
        &state.redeem,
        req,
    )
    .await?;
    Ok(Json(receipt))
}
