//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들과 라우터 조립을 담당합니다.
//! 핸들러는 요청을 서비스 계층으로 넘기고, 결과를 JSON 응답으로 돌려줄 뿐입니다.
//!
//! 각 하위 모듈:
//! - `health`: 서버/DB 상태 확인
//! - `sessions`: 소유자용 세션 열기/종료/코드 회전/조회/출석 현황
//! - `redeem`: 학생용 출석 처리

pub mod health;
pub mod redeem;
pub mod sessions;

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::services::{CodeIssuer, RedeemOptions, RoleAuthorizer, SqliteRoster};

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// 담긴 값은 모두 저렴하게 clone되며, 요청 사이에 바뀌는 메모리 상태는 없습니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (내부적으로 Arc로 공유)
    pub pool: SqlitePool,
    /// 액세스 토큰 검증용 비밀키
    pub jwt_secret: String,
    pub codes: CodeIssuer,
    pub roster: SqliteRoster,
    pub authz: RoleAuthorizer,
    pub redeem: RedeemOptions,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            codes: CodeIssuer::new(
                config.pin_length,
                config.jwt_secret.clone(),
                chrono::Duration::seconds(config.qr_ttl_secs),
            ),
            roster: SqliteRoster::new(pool.clone()),
            authz: RoleAuthorizer::new(pool.clone(), config.opener_roles.clone()),
            redeem: RedeemOptions {
                allow_self_register: config.allow_self_register,
                timeout: Duration::from_millis(config.redeem_timeout_ms),
            },
            pool,
        }
    }
}

/// 전체 API 라우터를 조립합니다.
///
/// 모든 경로는 `/api/v1` 아래에 중첩됩니다.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        // 소유자용 세션 API
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::open_session),
        )
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}/close", post(sessions::close_session))
        .route("/sessions/{id}/rotate", post(sessions::rotate_code))
        .route("/sessions/{id}/attendance", get(sessions::attendance))
        // 학생용 출석 API
        .route("/redeem", post(redeem::redeem))
        .with_state(state);

    // 개발 환경에서는 모든 출처를 허용합니다.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
