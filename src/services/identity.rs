//! # 신원 확인 (Identity Resolver)
//!
//! 학생이 제시한 토큰을 명부 항목의 정식 ID로 바꿉니다.
//! 토큰은 명부 ID이거나 연락처 이메일입니다. 명부에 없으면 자동 등록이 허용된 경우에만,
//! 그리고 이메일 형태의 토큰만 등록합니다.

use std::future::Future;

use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::models::Resolution;

const MAX_DISPLAY_NAME_LEN: usize = 100;

pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)`: 명부에 없고 등록할 수도 없는 토큰
    fn resolve_or_create(
        &self,
        token: &str,
        display_name: Option<&str>,
        authorized_self_register: bool,
    ) -> impl Future<Output = Result<Option<Resolution>, AppError>> + Send;

    fn lookup(
        &self,
        identity_id: &str,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;
}

/// `roster_entries` 테이블 기반 명부
#[derive(Clone)]
pub struct SqliteRoster {
    pool: SqlitePool,
}

impl SqliteRoster {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl IdentityResolver for SqliteRoster {
    async fn resolve_or_create(
        &self,
        token: &str,
        display_name: Option<&str>,
        authorized_self_register: bool,
    ) -> Result<Option<Resolution>, AppError> {
        let token = token.trim();
        let contact = token.to_lowercase();

        if let Some(entry) = db::roster::find_by_id_or_contact(&self.pool, token, &contact).await? {
            return Ok(Some(Resolution {
                identity_id: entry.id,
                created: false,
            }));
        }

        if !authorized_self_register || !is_email(&contact) {
            return Ok(None);
        }

        let name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.chars().take(MAX_DISPLAY_NAME_LEN).collect::<String>())
            .unwrap_or_else(|| default_display_name(&contact));

        // 첫 출석이 동시에 들어오면 UNIQUE 연락처에서 한쪽 INSERT만 반영되고,
        // 양쪽 모두 같은 행을 다시 읽습니다.
        let id = uuid::Uuid::now_v7().to_string();
        let created = db::roster::insert_if_absent(&self.pool, &id, &name, &contact).await?;

        let entry = db::roster::find_by_contact(&self.pool, &contact)
            .await?
            .ok_or(AppError::Internal(
                "Failed to retrieve enrolled roster entry".to_string(),
            ))?;

        if created {
            tracing::info!(identity_id = %entry.id, "roster entry enrolled on first check-in");
        }

        Ok(Some(Resolution {
            identity_id: entry.id,
            created,
        }))
    }

    async fn lookup(&self, identity_id: &str) -> Result<Option<String>, AppError> {
        let entry = db::roster::find_by_id(&self.pool, identity_id).await?;
        Ok(entry.map(|entry| entry.display_name))
    }
}

fn is_email(token: &str) -> bool {
    match token.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !token.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn default_display_name(email: &str) -> String {
    email
        .split_once('@')
        .map(|(local, _)| local)
        .unwrap_or(email)
        .to_string()
}
