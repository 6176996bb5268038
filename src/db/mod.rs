//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 서비스 계층(services/)에서 이 모듈의 함수를 호출합니다.
//!
//! 각 하위 모듈:
//! - `sessions`: 출석 세션 열기(기존 세션 대체 포함)/종료/코드 회전/만료 정리
//! - `attendance`: 출석 이벤트 기록과 현황 조회
//! - `roster`: 명부 항목 조회와 등록
//!
//! 요청 사이의 불변식(소유자당 활성 세션 하나, 세션·학생당 출석 하나)은
//! 애플리케이션 메모리가 아니라 DB 제약과 트랜잭션으로 지킵니다.

pub mod attendance;
pub mod roster;
pub mod sessions;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// DB에 저장하는 타임스탬프 형식 (SQLite의 `strftime('%Y-%m-%dT%H:%M:%fZ')`와 동일)
///
/// 자릿수가 고정되어 있어서 문자열 비교가 곧 시간 비교입니다.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// RFC 3339 문자열을 UTC 시각으로 파싱합니다. 형식이 틀리면 None.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// SQLite 연결 풀을 만들고 마이그레이션을 실행합니다.
///
/// - 파일이 없으면 생성합니다.
/// - 외래키 제약을 켭니다 (세션 삭제 시 출석 이벤트도 함께 삭제).
/// - WAL 모드와 busy timeout으로 동시 쓰기 요청이 바로 실패하지 않고 대기하게 합니다.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// 테스트용 인메모리 DB
///
/// `sqlite::memory:`는 연결마다 별도의 DB가 되므로 연결 하나를 고정해서 씁니다.
/// 동시 요청은 이 연결을 차례로 빌려 쓰게 되고, 중복 방지는 여전히 UNIQUE 제약이 담당합니다.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
