//! # 출석 처리 (Redemption)
//!
//! 코드와 신원 토큰을 받아 출석 이벤트를 정확히 한 번 기록합니다.
//!
//! ## 처리 단계
//! ```text
//! 1. 코드 해석       PIN / QR 페이로드           → InvalidInput, InvalidOrExpiredCode
//! 2. 세션 조회       출석 가능 조건으로 필터       → InvalidOrExpiredCode
//! 3. 신원 확인       명부 조회 또는 자동 등록      → IdentityNotFound
//! 4. 원자적 기록     INSERT ... WHERE 세션 유효   → AlreadyRedeemed, InvalidOrExpiredCode
//! ```
//!
//! 2~3단계는 제한 시간 안에 끝나야 하며, 시간을 넘기면 이벤트를 기록하지 않고 실패합니다.
//! 4단계는 한 문장짜리 INSERT라서 시작되면 커밋 여부가 그대로 결과가 됩니다.
//!
//! 중복 방지는 UNIQUE 제약 위반으로만 판단합니다. 같은 학생의 요청이 동시에 여러 개
//! 들어오면 먼저 커밋된 하나만 성공하고 나머지는 `AlreadyRedeemed`가 됩니다.
//! 저장소 에러는 자동으로 재시도하지 않습니다.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db;
use crate::error::{is_unique_violation, AppError};
use crate::models::{AttendanceSession, RedeemReceipt, RedeemRequest};
use crate::services::{CodeIssuer, IdentityResolver, PresentedCode};

/// 신원 토큰의 최대 길이 (이메일 주소 최대 길이)
const MAX_TOKEN_LEN: usize = 254;

#[derive(Debug, Clone)]
pub struct RedeemOptions {
    /// 명부에 없는 이메일을 첫 출석 때 등록할지 여부
    pub allow_self_register: bool,
    /// 세션 조회 + 신원 확인 제한 시간
    pub timeout: Duration,
}

/// 출석을 처리합니다.
///
/// 동시에 몇 번 호출되어도 안전합니다. 서로 다른 학생의 요청은 모두 성공하고,
/// 같은 학생의 요청은 정확히 하나만 성공합니다.
pub async fn redeem(
    pool: &SqlitePool,
    resolver: &impl IdentityResolver,
    codes: &CodeIssuer,
    options: &RedeemOptions,
    req: RedeemRequest,
) -> Result<RedeemReceipt, AppError> {
    let token = req.presented_identity_token.trim();
    if token.is_empty() {
        return Err(AppError::InvalidInput(
            "presented_identity_token is required".to_string(),
        ));
    }
    if token.len() > MAX_TOKEN_LEN || token.chars().any(char::is_control) {
        return Err(AppError::InvalidInput(
            "presented_identity_token is malformed".to_string(),
        ));
    }

    let presented = codes.parse(&req.code)?;
    let display_name = req.display_name.as_deref();

    let prepare = async {
        let session = find_session(pool, &presented).await?;

        let resolution = match resolver
            .resolve_or_create(token, display_name, options.allow_self_register)
            .await?
        {
            Some(resolution) => resolution,
            None => {
                tracing::debug!(session_id = %session.id, "check-in rejected: identity not found");
                return Err(AppError::IdentityNotFound);
            }
        };

        // 기록 뒤에 조회가 실패해서 이미 커밋된 출석을 실패로 보고하는 일이 없도록 먼저 조회합니다.
        let name = resolver.lookup(&resolution.identity_id).await?;

        Ok::<_, AppError>((session, resolution, name))
    };

    let (session, resolution, name) = tokio::time::timeout(options.timeout, prepare)
        .await
        .map_err(|_| AppError::Timeout)??;

    let event_id = uuid::Uuid::now_v7().to_string();
    let now = db::timestamp(Utc::now());

    let event = match db::attendance::record_event(
        pool,
        &event_id,
        &session.id,
        &resolution.identity_id,
        &now,
    )
    .await
    {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::debug!(session_id = %session.id, "check-in rejected: session closed before recording");
            return Err(AppError::InvalidOrExpiredCode);
        }
        Err(AppError::StorageUnavailable(ref e)) if is_unique_violation(e) => {
            tracing::debug!(
                session_id = %session.id,
                identity_id = %resolution.identity_id,
                "check-in rejected: already redeemed"
            );
            return Err(AppError::AlreadyRedeemed);
        }
        Err(e) => return Err(e),
    };

    tracing::info!(
        session_id = %event.session_id,
        identity_id = %event.identity_id,
        event_id = %event.id,
        enrolled = resolution.created,
        "check-in recorded"
    );

    let message = match &name {
        Some(name) => format!("{} is checked in to {}", name, session.label),
        None => format!("Checked in to {}", session.label),
    };

    Ok(RedeemReceipt {
        event_id: event.id,
        session_id: event.session_id,
        session_label: session.label,
        identity_id: event.identity_id,
        display_name: name,
        recorded_at: event.recorded_at,
        message,
    })
}

async fn find_session(
    pool: &SqlitePool,
    presented: &PresentedCode,
) -> Result<AttendanceSession, AppError> {
    let now = db::timestamp(Utc::now());

    let session = match presented {
        PresentedCode::Pin(pin) => db::sessions::find_redeemable_by_code(pool, pin, &now).await?,
        PresentedCode::Qr { session_id, code } => {
            db::sessions::find_redeemable_by_id(pool, session_id, code, &now).await?
        }
    };

    session.ok_or_else(|| {
        tracing::debug!("check-in rejected: invalid or expired code");
        AppError::InvalidOrExpiredCode
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OpenSessionRequest;
    use crate::services::lifecycle;
    use crate::test_support::Fixture;
    use futures::future::join_all;
    use std::sync::Arc;

    fn request(code: &str, token: &str) -> RedeemRequest {
        RedeemRequest {
            code: code.to_string(),
            presented_identity_token: token.to_string(),
            display_name: None,
        }
    }

    async fn open(fx: &Fixture, label: &str, duration_secs: Option<i64>) -> crate::models::SessionResponse {
        lifecycle::open_session(
            &fx.pool,
            &fx.authz,
            &fx.codes,
            &fx.teacher,
            OpenSessionRequest {
                label: label.to_string(),
                duration_secs,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn redeem_once_then_already_redeemed() {
        let fx = Fixture::new().await;
        let s1 = fx.enroll("s1@school.edu", "Student One").await;
        let opened = open(&fx, "Algebra", None).await;
        let code = opened.session.code.clone();
        assert_eq!(code.len(), 5);

        let receipt = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&code, &s1))
            .await
            .unwrap();
        assert_eq!(receipt.session_label, "Algebra");
        assert_eq!(receipt.identity_id, s1);
        assert_eq!(receipt.display_name.as_deref(), Some("Student One"));
        assert!(receipt.message.contains("Algebra"));

        let err = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&code, &s1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyRedeemed));

        assert_eq!(
            db::attendance::count_for_session(&fx.pool, &opened.session.id)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn superseded_session_code_is_rejected() {
        let fx = Fixture::new().await;
        let s1 = fx.enroll("s1@school.edu", "Student One").await;
        let old = open(&fx, "Algebra", None).await;
        let new = open(&fx, "Algebra II", None).await;

        assert_ne!(new.session.code, old.session.code);

        let err = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&old.session.code, &s1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredCode));
    }

    #[tokio::test]
    async fn already_expired_session_rejects_every_redeem() {
        let fx = Fixture::new().await;
        let s1 = fx.enroll("s1@school.edu", "Student One").await;
        let opened = open(&fx, "Algebra", Some(-1)).await;

        let err = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&opened.session.code, &s1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredCode));

        let qr = opened.qr_payload.unwrap();
        let err = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&qr, &s1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredCode));
    }

    #[tokio::test]
    async fn closed_session_rejects_redeem() {
        let fx = Fixture::new().await;
        let s1 = fx.enroll("s1@school.edu", "Student One").await;
        let opened = open(&fx, "Algebra", None).await;
        lifecycle::close_session(&fx.pool, &fx.authz, &fx.teacher, &opened.session.id)
            .await
            .unwrap();

        let err = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&opened.session.code, &s1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredCode));
    }

    #[tokio::test]
    async fn unknown_presenter_is_enrolled_then_reused() {
        let fx = Fixture::new().await;
        let opened = open(&fx, "Algebra", None).await;
        let code = opened.session.code.clone();

        let first = redeem(
            &fx.pool,
            &fx.roster,
            &fx.codes,
            &fx.options,
            RedeemRequest {
                code: code.clone(),
                presented_identity_token: "new.student@school.edu".to_string(),
                display_name: Some("New Student".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(first.display_name.as_deref(), Some("New Student"));

        let err = redeem(
            &fx.pool,
            &fx.roster,
            &fx.codes,
            &fx.options,
            request(&code, "NEW.STUDENT@school.edu"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::AlreadyRedeemed));

        let again = db::roster::find_by_contact(&fx.pool, "new.student@school.edu")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, first.identity_id);
    }

    #[tokio::test]
    async fn unknown_presenter_without_self_register_is_not_found() {
        let fx = Fixture::new().await;
        let opened = open(&fx, "Algebra", None).await;
        let options = RedeemOptions {
            allow_self_register: false,
            ..fx.options.clone()
        };

        let err = redeem(
            &fx.pool,
            &fx.roster,
            &fx.codes,
            &options,
            request(&opened.session.code, "stranger@school.edu"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::IdentityNotFound));
        assert_eq!(
            db::attendance::count_for_session(&fx.pool, &opened.session.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn malformed_inputs_are_invalid_input() {
        let fx = Fixture::new().await;
        let opened = open(&fx, "Algebra", None).await;

        for req in [
            request("", "s1@school.edu"),
            request(&opened.session.code, "   "),
            request(&opened.session.code, &"x".repeat(300)),
        ] {
            let err = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, req)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "{:?}", err);
        }
    }

    #[tokio::test]
    async fn qr_payload_redeems_and_dies_on_rotation() {
        let fx = Fixture::new().await;
        let s1 = fx.enroll("s1@school.edu", "Student One").await;
        let s2 = fx.enroll("s2@school.edu", "Student Two").await;
        let opened = open(&fx, "Algebra", None).await;
        let qr = opened.qr_payload.clone().unwrap();

        let receipt = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&qr, &s1))
            .await
            .unwrap();
        assert_eq!(receipt.session_id, opened.session.id);

        let rotated = lifecycle::rotate_code(&fx.pool, &fx.authz, &fx.codes, &fx.teacher, &opened.session.id)
            .await
            .unwrap();

        let err = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&qr, &s2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredCode));

        let err = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&opened.session.code, &s2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredCode));

        redeem(
            &fx.pool,
            &fx.roster,
            &fx.codes,
            &fx.options,
            request(&rotated.qr_payload.unwrap(), &s2),
        )
        .await
        .unwrap();

        // 회전 전에 기록된 출석은 유지됩니다
        assert_eq!(
            db::attendance::count_for_session(&fx.pool, &opened.session.id)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redeems_for_one_identity_record_exactly_once() {
        let fx = Arc::new(Fixture::new().await);
        let s1 = fx.enroll("s1@school.edu", "Student One").await;
        let opened = open(&fx, "Algebra", None).await;

        let handles = (0..50).map(|_| {
            let fx = Arc::clone(&fx);
            let code = opened.session.code.clone();
            let s1 = s1.clone();
            tokio::spawn(async move {
                redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&code, &s1)).await
            })
        });

        let results = join_all(handles).await;
        let successes = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(AppError::AlreadyRedeemed))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(duplicates, 49);
        assert_eq!(
            db::attendance::count_for_session(&fx.pool, &opened.session.id)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redeems_for_different_identities_all_succeed() {
        let fx = Arc::new(Fixture::new().await);
        let opened = open(&fx, "Algebra", None).await;

        let handles = (0..30).map(|i| {
            let fx = Arc::clone(&fx);
            let code = opened.session.code.clone();
            tokio::spawn(async move {
                let token = format!("student{}@school.edu", i);
                redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&code, &token)).await
            })
        });

        let results = join_all(handles).await;
        assert!(results.iter().all(|r| matches!(r, Ok(Ok(_)))));
        assert_eq!(
            db::attendance::count_for_session(&fx.pool, &opened.session.id)
                .await
                .unwrap(),
            30
        );
    }

    /// 명부 응답이 제한 시간보다 늦게 오는 신원 확인기
    struct SlowRoster {
        delay: Duration,
        identity_id: String,
    }

    impl IdentityResolver for SlowRoster {
        async fn resolve_or_create(
            &self,
            _token: &str,
            _display_name: Option<&str>,
            _authorized_self_register: bool,
        ) -> Result<Option<crate::models::Resolution>, AppError> {
            tokio::time::sleep(self.delay).await;
            Ok(Some(crate::models::Resolution {
                identity_id: self.identity_id.clone(),
                created: false,
            }))
        }

        async fn lookup(&self, _identity_id: &str) -> Result<Option<String>, AppError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn timed_out_redeem_records_nothing() {
        let fx = Fixture::new().await;
        let s1 = fx.enroll("s1@school.edu", "Student One").await;
        let opened = open(&fx, "Algebra", None).await;
        let slow = SlowRoster {
            delay: Duration::from_millis(500),
            identity_id: s1.clone(),
        };
        let options = RedeemOptions {
            allow_self_register: true,
            timeout: Duration::from_millis(50),
        };

        let err = redeem(&fx.pool, &slow, &fx.codes, &options, request(&opened.session.code, &s1))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout));
        assert_eq!(
            db::attendance::count_for_session(&fx.pool, &opened.session.id)
                .await
                .unwrap(),
            0
        );

        // 명부가 제때 응답하면 같은 학생이 다시 출석할 수 있습니다
        let receipt = redeem(&fx.pool, &fx.roster, &fx.codes, &fx.options, request(&opened.session.code, &s1))
            .await
            .unwrap();
        assert_eq!(receipt.identity_id, s1);
    }
}
