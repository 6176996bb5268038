//! # 만료 세션 정리
//!
//! 종료 예정 시각이 지난 활성 세션을 백그라운드에서 비활성으로 바꿉니다.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db;
use crate::error::AppError;

pub async fn sweep_expired(pool: &SqlitePool) -> Result<u64, AppError> {
    let now = db::timestamp(Utc::now());
    db::sessions::expire_sessions(pool, &now).await
}

/// `every`마다 [`sweep_expired`]를 실행합니다. 실패는 로그만 남기고 다음 주기에 다시 시도합니다.
pub fn spawn_expiry_sweeper(pool: SqlitePool, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match sweep_expired(&pool).await {
                Ok(0) => {}
                Ok(expired) => tracing::info!(expired, "expired attendance sessions deactivated"),
                Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
            }
        }
    })
}
