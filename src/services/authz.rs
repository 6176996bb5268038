//! # 권한 확인
//!
//! 누가 세션을 열 수 있는지, 세션의 소유자가 누구인지 판단합니다.

use std::future::Future;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;

pub trait Authorizer: Send + Sync {
    fn can_open_session(&self, caller: &AuthUser) -> bool;

    fn is_owner(
        &self,
        session_id: &str,
        owner_id: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;
}

/// 세션 열기는 토큰 역할로, 소유 여부는 세션 행의 `owner_id`로 판단합니다.
#[derive(Clone)]
pub struct RoleAuthorizer {
    pool: SqlitePool,
    opener_roles: Arc<[String]>,
}

impl RoleAuthorizer {
    pub fn new(pool: SqlitePool, opener_roles: Vec<String>) -> Self {
        Self {
            pool,
            opener_roles: opener_roles.into(),
        }
    }
}

impl Authorizer for RoleAuthorizer {
    fn can_open_session(&self, caller: &AuthUser) -> bool {
        self.opener_roles.iter().any(|role| *role == caller.role)
    }

    async fn is_owner(&self, session_id: &str, owner_id: &str) -> Result<bool, AppError> {
        db::sessions::is_owned_by(&self.pool, session_id, owner_id).await
    }
}
