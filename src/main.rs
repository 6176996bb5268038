//! # Rollcall 웹 서버 진입점
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 연결 풀 생성 + 마이그레이션 실행
//! 4. 만료 세션 정리 태스크 시작
//! 5. API 라우터 설정
//! 6. HTTP 서버 시작 (Ctrl+C로 정상 종료)

use anyhow::Result;
use rollcall::{config::Config, db, routes, services::sweeper};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // RUST_LOG 환경변수가 없으면 기본 필터를 사용합니다.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting Rollcall server on {}:{}", config.host, config.port);

    tracing::info!("Connecting to database and running migrations...");
    let pool = db::connect(&config.database_url, config.db_max_connections).await?;

    // 조회 조건이 이미 시각으로 만료를 판단하므로, 정리 태스크는 꺼져 있어도 정확성에는 영향이 없습니다.
    if config.sweep_interval_secs > 0 {
        sweeper::spawn_expiry_sweeper(
            pool.clone(),
            Duration::from_secs(config.sweep_interval_secs),
        );
    } else {
        tracing::info!("Expiry sweeper disabled");
    }

    let app = routes::router(routes::AppState::new(pool.clone(), &config));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
