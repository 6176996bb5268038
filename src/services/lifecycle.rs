//! # 세션 라이프사이클 관리
//!
//! 세션 열기, 종료, 코드 회전, 조회를 담당합니다.
//!
//! ## 대체(supersession)
//! 세션을 열면 같은 소유자의 기존 활성 세션은 같은 트랜잭션 안에서 닫힙니다.
//! 동시에 두 요청이 같은 소유자의 세션을 열더라도 DB의 부분 UNIQUE 인덱스가
//! 두 번째 커밋을 거부하므로 활성 세션은 항상 하나 이하입니다.
//!
//! ## 코드 충돌
//! 새 PIN이 다른 활성 세션의 PIN과 겹치면 UNIQUE 위반으로 트랜잭션 전체가 롤백되고,
//! 새 코드로 다시 시도합니다. 롤백된 시도는 아무 흔적도 남기지 않습니다.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::db::{self, sessions::NewSession};
use crate::error::{is_unique_violation, AppError};
use crate::middleware::auth::AuthUser;
use crate::models::{AttendanceSession, OpenSessionRequest, SessionResponse};
use crate::services::{Authorizer, CodeIssuer};

/// 코드 충돌 시 재시도 횟수
const MAX_CODE_ATTEMPTS: usize = 8;

/// 세션을 엽니다.
///
/// ## 처리 흐름
/// 1. 세션을 열 권한 확인 (`Unauthorized`)
/// 2. 라벨이 비어 있는지 확인 (`InvalidInput`)
/// 3. 종료 예정 시각 계산: `duration_secs`가 음수면 이미 만료된 세션이 됩니다
/// 4. 기존 활성 세션 대체 + 새 세션 삽입 (한 트랜잭션)
pub async fn open_session(
    pool: &SqlitePool,
    authz: &impl Authorizer,
    codes: &CodeIssuer,
    caller: &AuthUser,
    req: OpenSessionRequest,
) -> Result<SessionResponse, AppError> {
    if !authz.can_open_session(caller) {
        return Err(AppError::Unauthorized(
            "Not permitted to open attendance sessions".to_string(),
        ));
    }

    // 라벨은 비어 있지만 않으면 받은 그대로 저장합니다.
    if req.label.trim().is_empty() {
        return Err(AppError::InvalidInput("Label must not be empty".to_string()));
    }
    let label = req.label.as_str();

    let now = Utc::now();
    let closed_at = match req.duration_secs {
        Some(secs) => Some(
            Duration::try_seconds(secs)
                .and_then(|duration| now.checked_add_signed(duration))
                .map(db::timestamp)
                .ok_or_else(|| {
                    AppError::InvalidInput("duration_secs is out of range".to_string())
                })?,
        ),
        None => None,
    };
    let opened_at = db::timestamp(now);

    // 시간이 지난 세션이 코드 슬롯을 잡고 있지 않도록 먼저 정리합니다.
    db::sessions::expire_sessions(pool, &opened_at).await?;

    // 대체될 세션의 코드를 새 세션이 물려받으면 이전 코드가 계속 통하게 됩니다.
    let superseded_code = db::sessions::active_code_for_owner(pool, &caller.user_id).await?;

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let id = uuid::Uuid::now_v7().to_string();
        let code = codes.generate_pin();
        if superseded_code.as_deref() == Some(code.as_str()) {
            continue;
        }

        let new = NewSession {
            id: &id,
            owner_id: &caller.user_id,
            label,
            code: &code,
            opened_at: &opened_at,
            closed_at: closed_at.as_deref(),
        };

        match db::sessions::open_superseding(pool, &new).await {
            Ok((session, superseded)) => {
                tracing::info!(
                    session_id = %session.id,
                    owner_id = %session.owner_id,
                    superseded,
                    closed_at = ?session.closed_at,
                    "attendance session opened"
                );
                let qr_payload = codes.issue_qr(&session, now)?;
                return Ok(SessionResponse {
                    session,
                    qr_payload: Some(qr_payload),
                });
            }
            Err(AppError::StorageUnavailable(ref e)) if is_unique_violation(e) => {
                tracing::debug!(attempt, "active session conflict on open, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Internal(
        "Could not allocate a unique session code".to_string(),
    ))
}

/// 세션을 닫습니다. 이미 닫힌 세션이면 아무것도 바꾸지 않고 성공합니다.
pub async fn close_session(
    pool: &SqlitePool,
    authz: &impl Authorizer,
    caller: &AuthUser,
    session_id: &str,
) -> Result<AttendanceSession, AppError> {
    ensure_owner(pool, authz, caller, session_id).await?;

    let now = db::timestamp(Utc::now());
    if db::sessions::close_session(pool, session_id, &now).await? {
        tracing::info!(session_id, owner_id = %caller.user_id, "attendance session closed");
    }

    db::sessions::get_session(pool, session_id)
        .await?
        .ok_or(AppError::NotFound)
}

/// 아직 열려 있는 세션에 새 코드를 발급합니다.
///
/// 세션 ID와 기록된 출석은 그대로 유지되고, 이전 PIN과 이전 QR 페이로드는 더 이상 통하지 않습니다.
pub async fn rotate_code(
    pool: &SqlitePool,
    authz: &impl Authorizer,
    codes: &CodeIssuer,
    caller: &AuthUser,
    session_id: &str,
) -> Result<SessionResponse, AppError> {
    let current = ensure_owner(pool, authz, caller, session_id).await?;
    if !current.active {
        return Err(AppError::SessionClosed);
    }

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = codes.generate_pin();
        if code == current.code {
            continue;
        }

        let now = Utc::now();
        match db::sessions::update_code(pool, session_id, &code, &db::timestamp(now)).await {
            Ok(true) => {
                let session = db::sessions::get_session(pool, session_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                tracing::info!(session_id, "attendance session code rotated");
                let qr_payload = codes.issue_qr(&session, now)?;
                return Ok(SessionResponse {
                    session,
                    qr_payload: Some(qr_payload),
                });
            }
            Ok(false) => return Err(AppError::SessionClosed),
            Err(AppError::StorageUnavailable(ref e)) if is_unique_violation(e) => {
                tracing::debug!(attempt, session_id, "code collision on rotate, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Internal(
        "Could not allocate a unique session code".to_string(),
    ))
}

/// 소유자가 자기 세션 하나를 조회합니다. 활성 세션이면 QR 페이로드도 함께 돌려줍니다.
pub async fn get_session(
    pool: &SqlitePool,
    authz: &impl Authorizer,
    codes: &CodeIssuer,
    caller: &AuthUser,
    session_id: &str,
) -> Result<SessionResponse, AppError> {
    let session = ensure_owner(pool, authz, caller, session_id).await?;

    let now = Utc::now();
    let qr_payload = if is_redeemable(&session, now) {
        Some(codes.issue_qr(&session, now)?)
    } else {
        None
    };

    Ok(SessionResponse {
        session,
        qr_payload,
    })
}

/// 활성 플래그가 남아 있어도 종료 예정 시각이 지났으면 출석 가능하지 않습니다.
fn is_redeemable(session: &AttendanceSession, now: DateTime<Utc>) -> bool {
    session.active
        && session
            .closed_at
            .as_deref()
            .and_then(db::parse_timestamp)
            .map_or(true, |closed_at| closed_at >= now)
}

/// 호출자가 연 세션 이력 (최신순)
pub async fn list_sessions(
    pool: &SqlitePool,
    caller: &AuthUser,
) -> Result<Vec<AttendanceSession>, AppError> {
    db::sessions::list_sessions_for_owner(pool, &caller.user_id).await
}

/// 세션이 존재하고 호출자가 소유자인지 확인한 뒤 세션을 돌려줍니다.
pub(crate) async fn ensure_owner(
    pool: &SqlitePool,
    authz: &impl Authorizer,
    caller: &AuthUser,
    session_id: &str,
) -> Result<AttendanceSession, AppError> {
    let session = db::sessions::get_session(pool, session_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !authz.is_owner(session_id, &caller.user_id).await? {
        return Err(AppError::Unauthorized("Not your session".to_string()));
    }

    Ok(session)
}
