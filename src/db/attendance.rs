//! # 출석 이벤트 데이터베이스 쿼리 모듈
//!
//! 출석 이벤트 기록과 세션별 출석 현황 조회를 담당합니다.
//!
//! 같은 세션에 같은 학생이 두 번 기록되지 않도록 하는 것은
//! `attendance_events`의 `UNIQUE (session_id, identity_id)` 제약입니다.
//! 기록 전에 SELECT로 중복을 확인하지 않습니다. 동시에 들어온 두 요청이
//! 모두 "없음"을 보고 INSERT할 수 있기 때문입니다.

use crate::error::AppError;
use crate::models::{AttendanceEvent, Attendee};
use sqlx::SqlitePool;

/// 세션이 아직 출석 가능한 경우에만 출석 이벤트를 기록합니다.
///
/// `INSERT ... SELECT ... WHERE` 한 문장으로 실행되므로, 세션 조회 후 기록 전에
/// 세션이 닫히면 아무것도 기록되지 않습니다.
///
/// ## 반환값
/// - `Ok(Some(event))`: 기록 성공
/// - `Ok(None)`: 세션이 더 이상 출석 가능하지 않음
/// - `Err(StorageUnavailable)`: UNIQUE 위반(이미 출석)을 포함한 DB 에러
pub async fn record_event(
    pool: &SqlitePool,
    id: &str,
    session_id: &str,
    identity_id: &str,
    now: &str,
) -> Result<Option<AttendanceEvent>, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_events (id, session_id, identity_id, recorded_at)
        SELECT ?, s.id, ?, ?
        FROM attendance_sessions s
        WHERE s.id = ?
          AND s.active = 1
          AND s.opened_at <= ?
          AND (s.closed_at IS NULL OR s.closed_at >= ?)
        "#,
    )
    .bind(id)
    .bind(identity_id)
    .bind(now)
    .bind(session_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    Ok(Some(AttendanceEvent {
        seq: result.last_insert_rowid(),
        id: id.to_string(),
        session_id: session_id.to_string(),
        identity_id: identity_id.to_string(),
        recorded_at: now.to_string(),
    }))
}

/// 세션에 기록된 전체 출석 수
pub async fn count_for_session(pool: &SqlitePool, session_id: &str) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM attendance_events WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// 세션의 출석자 목록을 커밋 순서대로 조회합니다.
///
/// `after`가 주어지면 그 `seq`보다 뒤에 커밋된 출석자만 돌려줍니다.
/// `recorded_at`은 커밋 전에 찍히므로 커서로 쓰면 늦게 커밋된 이벤트를 놓칠 수 있습니다.
/// `seq`는 쓰기 잠금 아래에서 배정되므로 보이는 값은 항상 빈틈없는 앞부분입니다.
pub async fn list_attendees(
    pool: &SqlitePool,
    session_id: &str,
    after: Option<i64>,
) -> Result<Vec<Attendee>, AppError> {
    let attendees = sqlx::query_as::<_, Attendee>(
        r#"
        SELECT e.seq, e.identity_id, r.display_name, e.recorded_at
        FROM attendance_events e
        JOIN roster_entries r ON r.id = e.identity_id
        WHERE e.session_id = ?
          AND e.seq > ?
        ORDER BY e.seq
        "#,
    )
    .bind(session_id)
    .bind(after.unwrap_or(0))
    .fetch_all(pool)
    .await?;

    Ok(attendees)
}
