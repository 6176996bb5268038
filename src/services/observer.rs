//! # 실시간 출석 현황 (읽기 전용)
//!
//! 세션 소유자의 화면이 짧은 주기로 폴링해서 "지금까지 누가 출석했는지"를 보여줍니다.
//! 커밋된 출석 이벤트만 읽고 아무것도 쓰지 않으므로, 출석 처리의 정확성에 영향을 주지 않습니다.

use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::{AttendanceSnapshot, PollQuery};
use crate::services::{lifecycle, Authorizer};

/// 세션의 출석 수와 출석자 목록을 조회합니다.
///
/// `count`는 항상 전체 출석 수이고, `after`가 있으면 `attendees`에는
/// 그 커서 뒤에 커밋된 출석자만 담깁니다.
pub async fn poll(
    pool: &SqlitePool,
    authz: &impl Authorizer,
    caller: &AuthUser,
    session_id: &str,
    query: PollQuery,
) -> Result<AttendanceSnapshot, AppError> {
    if query.after.is_some_and(|after| after < 0) {
        return Err(AppError::InvalidInput(
            "after must not be negative".to_string(),
        ));
    }

    let session = lifecycle::ensure_owner(pool, authz, caller, session_id).await?;

    let count = db::attendance::count_for_session(pool, &session.id).await?;
    let attendees = db::attendance::list_attendees(pool, &session.id, query.after).await?;
    let cursor = attendees
        .last()
        .map(|attendee| attendee.seq)
        .or(query.after)
        .unwrap_or(0);

    Ok(AttendanceSnapshot {
        session_id: session.id,
        active: session.active,
        count,
        attendees,
        cursor,
    })
}
