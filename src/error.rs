//! # 에러 처리 모듈
//!
//! 애플리케이션에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//!
//! 이 모듈의 핵심:
//! - `AppError` 열거형(enum): 모든 에러 종류를 하나의 타입으로 통합
//! - `IntoResponse` 구현: 에러를 HTTP 응답으로 자동 변환
//!
//! 출석 처리(redeem)의 실패 네 가지(`InvalidOrExpiredCode`, `IdentityNotFound`,
//! `AlreadyRedeemed`, `InvalidInput`)는 예외가 아니라 예상된 결과입니다.
//! 상태 코드가 같더라도 응답 본문의 `code` 필드로 서로 구분됩니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
///
/// 핸들러에서 `Result<T, AppError>`를 반환하면,
/// Axum이 자동으로 `IntoResponse`를 호출하여 HTTP 응답으로 변환합니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 잘못된 입력 (HTTP 400): 빈 라벨, 형식이 맞지 않는 토큰 등
    #[error("{0}")]
    InvalidInput(String),

    /// 권한 없음 (HTTP 403): 세션을 열 수 없는 역할이거나 다른 사람의 세션
    #[error("{0}")]
    Unauthorized(String),

    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// 코드가 없거나, 세션이 닫혔거나, 유효 기간이 지남 (HTTP 404)
    #[error("The code is invalid or has expired")]
    InvalidOrExpiredCode,

    /// 제시된 신원을 명부에서 찾을 수 없고 자동 등록도 허용되지 않음 (HTTP 404)
    #[error("Identity not recognized")]
    IdentityNotFound,

    /// 이 세션에 이미 출석 처리됨 (HTTP 409)
    #[error("Already checked in to this session")]
    AlreadyRedeemed,

    /// 이미 닫힌 세션에 대한 소유자 작업 (HTTP 409)
    #[error("Session is already closed")]
    SessionClosed,

    /// 저장소 오류 (HTTP 503)
    ///
    /// 커밋 여부가 불분명할 수 있으므로, 호출자는 다시 조회한 뒤 재시도해야 합니다.
    /// #[from]: sqlx 함수에서 `?`를 쓰면 자동으로 이 variant로 변환됩니다.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    /// 제한 시간 초과 (HTTP 503): 저장소 오류와 같은 종류로 응답합니다.
    #[error("Operation timed out")]
    Timeout,

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 응답 본문의 `code` 필드에 들어가는 기계 판독용 에러 종류
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound => "not_found",
            AppError::InvalidOrExpiredCode => "invalid_or_expired_code",
            AppError::IdentityNotFound => "identity_not_found",
            AppError::AlreadyRedeemed => "already_redeemed",
            AppError::SessionClosed => "session_closed",
            AppError::StorageUnavailable(_) | AppError::Timeout => "storage_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound | AppError::InvalidOrExpiredCode | AppError::IdentityNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::AlreadyRedeemed | AppError::SessionClosed => StatusCode::CONFLICT,
            AppError::StorageUnavailable(_) | AppError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// sqlx 에러가 UNIQUE 제약 위반인지 확인합니다.
///
/// 중복 출석 방지와 활성 세션/코드 충돌 감지는 모두 이 판별에 의존합니다.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(StorageUnavailable, Internal)는 실제 에러 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.kind();

        let message = match self {
            AppError::StorageUnavailable(ref e) => {
                tracing::error!(error = %e, "Storage error");
                "Storage is temporarily unavailable".to_string()
            }
            AppError::Timeout => {
                tracing::error!("Operation timed out");
                "Storage is temporarily unavailable".to_string()
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            ref other => other.to_string(),
        };

        // 결과: { "error": { "code": "already_redeemed", "message": "..." } }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
