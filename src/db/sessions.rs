//! # 출석 세션 데이터베이스 쿼리 모듈
//!
//! 출석 세션의 열기, 종료, 코드 회전, 조회, 만료 정리를 담당하는 SQL 쿼리 함수들입니다.
//!
//! ## 세션 라이프사이클
//! ```text
//! open_superseding() → 활성(active = 1) ─┬→ close_session()   → 비활성(active = 0)
//!                         │ update_code() └→ expire_sessions() → 비활성(active = 0)
//!                         └─────────────┘
//! ```
//!
//! "출석 가능" 조건은 모든 조회에서 같습니다:
//! `active = 1 AND opened_at <= now AND (closed_at IS NULL OR closed_at >= now)`

use crate::error::AppError;
use crate::models::AttendanceSession;
use sqlx::SqlitePool;

/// 새로 열 세션의 값
#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub label: &'a str,
    pub code: &'a str,
    pub opened_at: &'a str,
    pub closed_at: Option<&'a str>,
}

/// 같은 소유자의 활성 세션을 모두 닫고 새 세션을 엽니다.
///
/// 두 단계는 하나의 트랜잭션으로 실행됩니다. 중간에 실패하면 롤백되므로
/// 기존 세션만 닫히고 새 세션이 없는 상태나, 활성 세션이 둘인 상태는 생기지 않습니다.
/// 활성 세션 사이의 코드 충돌이나 동시 열기 경쟁은 부분 UNIQUE 인덱스가 거부합니다.
///
/// ## 반환값
/// 새 세션과, 이번에 대체(supersede)된 기존 세션 수
pub async fn open_superseding(
    pool: &SqlitePool,
    new: &NewSession<'_>,
) -> Result<(AttendanceSession, u64), AppError> {
    let mut tx = pool.begin().await?;

    // 종료 시각이 비어 있거나 아직 미래라면 지금으로 당깁니다.
    let superseded = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET active = 0,
            closed_at = CASE
                WHEN closed_at IS NULL OR closed_at > ? THEN ?
                ELSE closed_at
            END
        WHERE owner_id = ? AND active = 1
        "#,
    )
    .bind(new.opened_at)
    .bind(new.opened_at)
    .bind(new.owner_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query(
        r#"
        INSERT INTO attendance_sessions (id, owner_id, label, code, opened_at, closed_at, active)
        VALUES (?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(new.id)
    .bind(new.owner_id)
    .bind(new.label)
    .bind(new.code)
    .bind(new.opened_at)
    .bind(new.closed_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let session = get_session(pool, new.id)
        .await?
        .ok_or(AppError::Internal(
            "Failed to retrieve opened session".to_string(),
        ))?;

    Ok((session, superseded))
}

/// ID로 세션 하나를 조회합니다.
pub async fn get_session(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<AttendanceSession>, AppError> {
    let session = sqlx::query_as::<_, AttendanceSession>(
        r#"
        SELECT id, owner_id, label, code, opened_at, closed_at, active
        FROM attendance_sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// 소유자의 세션 이력을 최신순으로 조회합니다.
pub async fn list_sessions_for_owner(
    pool: &SqlitePool,
    owner_id: &str,
) -> Result<Vec<AttendanceSession>, AppError> {
    let sessions = sqlx::query_as::<_, AttendanceSession>(
        r#"
        SELECT id, owner_id, label, code, opened_at, closed_at, active
        FROM attendance_sessions
        WHERE owner_id = ?
        ORDER BY opened_at DESC, id DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

/// 소유자의 현재 활성 세션 코드
pub async fn active_code_for_owner(
    pool: &SqlitePool,
    owner_id: &str,
) -> Result<Option<String>, AppError> {
    let code = sqlx::query_scalar::<_, String>(
        "SELECT code FROM attendance_sessions WHERE owner_id = ? AND active = 1",
    )
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;

    Ok(code)
}

/// 세션이 해당 소유자의 것인지 확인합니다.
pub async fn is_owned_by(pool: &SqlitePool, id: &str, owner_id: &str) -> Result<bool, AppError> {
    let owned = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM attendance_sessions WHERE id = ? AND owner_id = ?)",
    )
    .bind(id)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok(owned)
}

/// 활성 세션을 닫습니다.
///
/// 이미 비활성인 세션은 건드리지 않으므로 여러 번 호출해도 상태가 변하지 않습니다.
/// 종료 시각이 이미 과거라면 그대로 둡니다.
///
/// ## 반환값
/// - `true`: 이번 호출로 닫힘
/// - `false`: 이미 닫혀 있었거나 존재하지 않음
pub async fn close_session(pool: &SqlitePool, id: &str, now: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET active = 0,
            closed_at = CASE
                WHEN closed_at IS NULL OR closed_at > ? THEN ?
                ELSE closed_at
            END
        WHERE id = ? AND active = 1
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 아직 출석 가능한 세션의 코드를 바꿉니다.
///
/// 세션 ID, 열린 시각, 기록된 출석 이벤트는 그대로 유지됩니다.
/// 다른 활성 세션과 코드가 겹치면 UNIQUE 위반 에러가 반환됩니다.
///
/// ## 반환값
/// - `true`: 코드 변경됨
/// - `false`: 세션이 닫혔거나 만료됨
pub async fn update_code(
    pool: &SqlitePool,
    id: &str,
    code: &str,
    now: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET code = ?
        WHERE id = ?
          AND active = 1
          AND (closed_at IS NULL OR closed_at >= ?)
        "#,
    )
    .bind(code)
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// PIN 코드로 지금 출석 가능한 세션을 찾습니다.
///
/// 활성 세션 사이에서는 코드가 유일하므로 결과는 최대 한 건입니다.
/// 만료된 세션이 같은 코드를 갖고 있어도 출석 가능 조건으로 먼저 걸러냅니다.
pub async fn find_redeemable_by_code(
    pool: &SqlitePool,
    code: &str,
    now: &str,
) -> Result<Option<AttendanceSession>, AppError> {
    let session = sqlx::query_as::<_, AttendanceSession>(
        r#"
        SELECT id, owner_id, label, code, opened_at, closed_at, active
        FROM attendance_sessions
        WHERE code = ?
          AND active = 1
          AND opened_at <= ?
          AND (closed_at IS NULL OR closed_at >= ?)
        "#,
    )
    .bind(code)
    .bind(now)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// QR 페이로드가 가리키는 세션을 찾습니다.
///
/// 페이로드에 담긴 코드가 현재 코드와 같아야 하므로, 회전 이전의 QR은 찾지 못합니다.
pub async fn find_redeemable_by_id(
    pool: &SqlitePool,
    id: &str,
    code: &str,
    now: &str,
) -> Result<Option<AttendanceSession>, AppError> {
    let session = sqlx::query_as::<_, AttendanceSession>(
        r#"
        SELECT id, owner_id, label, code, opened_at, closed_at, active
        FROM attendance_sessions
        WHERE id = ?
          AND code = ?
          AND active = 1
          AND opened_at <= ?
          AND (closed_at IS NULL OR closed_at >= ?)
        "#,
    )
    .bind(id)
    .bind(code)
    .bind(now)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// 종료 예정 시각이 지난 활성 세션을 비활성으로 바꿉니다.
///
/// 출석 가능 여부는 조회 조건이 이미 시각으로 판단하므로, 이 정리는
/// 활성 플래그와 코드 슬롯을 실제 상태에 맞추는 작업입니다.
///
/// ## 반환값
/// 비활성화된 세션 수
pub async fn expire_sessions(pool: &SqlitePool, now: &str) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET active = 0
        WHERE active = 1
          AND closed_at IS NOT NULL
          AND closed_at < ?
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
