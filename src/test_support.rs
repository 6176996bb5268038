//! # 테스트 공용 픽스처
//!
//! 서비스 계층 테스트가 함께 쓰는 인메모리 DB와 협력 객체들입니다.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::db;
use crate::middleware::auth::AuthUser;
use crate::services::{CodeIssuer, RedeemOptions, RoleAuthorizer, SqliteRoster};

pub struct Fixture {
    pub pool: SqlitePool,
    pub authz: RoleAuthorizer,
    pub codes: CodeIssuer,
    pub roster: SqliteRoster,
    pub options: RedeemOptions,
    pub teacher: AuthUser,
    pub student: AuthUser,
}

impl Fixture {
    pub async fn new() -> Self {
        let pool = db::connect_in_memory().await.expect("in-memory pool");

        Self {
            authz: RoleAuthorizer::new(
                pool.clone(),
                vec!["instructor".to_string(), "admin".to_string()],
            ),
            codes: CodeIssuer::new(5, "test-secret", chrono::Duration::hours(1)),
            roster: SqliteRoster::new(pool.clone()),
            // 연결 하나를 고정해서 쓰므로 동시성 테스트는 차례로 실행됩니다. 제한 시간을 넉넉히 둡니다
            options: RedeemOptions {
                allow_self_register: true,
                timeout: Duration::from_secs(30),
            },
            teacher: AuthUser {
                user_id: "t-1".to_string(),
                role: "instructor".to_string(),
            },
            student: AuthUser {
                user_id: "s-1".to_string(),
                role: "student".to_string(),
            },
            pool,
        }
    }

    pub fn instructor(&self, user_id: &str) -> AuthUser {
        AuthUser {
            user_id: user_id.to_string(),
            role: "instructor".to_string(),
        }
    }

    /// 학생을 명부에 등록하고 정식 ID를 돌려줍니다.
    pub async fn enroll(&self, email: &str, display_name: &str) -> String {
        let id = uuid::Uuid::now_v7().to_string();
        db::roster::insert_if_absent(&self.pool, &id, display_name, email)
            .await
            .expect("enroll");

        db::roster::find_by_contact(&self.pool, email)
            .await
            .expect("lookup")
            .expect("enrolled entry")
            .id
    }
}
