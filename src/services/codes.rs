//! # 출석 코드 발급
//!
//! 두 가지 형태의 코드를 다룹니다.
//!
//! - **PIN**: 고정 자릿수의 10진수 문자열. `OsRng`에서 균등하게 뽑습니다.
//!   자릿수가 작아서 다른 활성 세션과 겹칠 수 있으므로, 활성 세션 사이의
//!   코드 유일성은 DB의 부분 UNIQUE 인덱스가 보장하고 충돌하면 새로 뽑습니다.
//! - **QR 페이로드**: 세션 ID와 현재 PIN을 묶어 HS256으로 서명한 토큰.
//!   세션 ID로 찾기 때문에 다른 세션과 충돌할 수 없고, PIN을 회전하면 무효가 됩니다.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::AppError;
use crate::models::AttendanceSession;

/// 제시된 코드 문자열의 최대 길이 (QR 페이로드 포함)
const MAX_PRESENTED_CODE_LEN: usize = 2048;

/// QR 페이로드에 서명되는 클레임
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct QrClaims {
    /// 세션 ID
    pub sid: String,
    /// 발급 시점의 PIN
    pub code: String,
    pub iat: i64,
    pub exp: i64,
}

/// 출석 요청에 담긴 코드의 해석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedCode {
    Pin(String),
    Qr { session_id: String, code: String },
}

#[derive(Clone)]
pub struct CodeIssuer {
    pin_length: usize,
    secret: String,
    qr_ttl: Duration,
}

impl CodeIssuer {
    pub fn new(pin_length: usize, secret: impl Into<String>, qr_ttl: Duration) -> Self {
        Self {
            pin_length,
            secret: secret.into(),
            qr_ttl,
        }
    }

    /// `pin_length` 자리의 PIN을 만듭니다. 앞자리 0도 그대로 유지됩니다.
    pub fn generate_pin(&self) -> String {
        let space = 10u32.pow(self.pin_length as u32);
        // 나머지 연산의 편향을 없애기 위해 space의 배수 범위 밖 값은 버립니다.
        let zone = u32::MAX - (u32::MAX % space);

        let value = loop {
            let candidate = OsRng.next_u32();
            if candidate < zone {
                break candidate % space;
            }
        };

        format!("{:0width$}", value, width = self.pin_length)
    }

    /// 세션의 현재 PIN을 담은 QR 페이로드를 서명합니다.
    ///
    /// 만료 시각은 세션의 종료 예정 시각이고, 없으면 발급 시점부터 `qr_ttl` 뒤입니다.
    pub fn issue_qr(
        &self,
        session: &AttendanceSession,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let exp = session
            .closed_at
            .as_deref()
            .and_then(db::parse_timestamp)
            .unwrap_or(now + self.qr_ttl);

        let claims = QrClaims {
            sid: session.id.clone(),
            code: session.code.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("QR payload signing failed: {}", e)))
    }

    /// QR 페이로드를 검증합니다. 서명이 틀리거나 만료되었으면 None.
    pub fn read_qr(&self, payload: &str) -> Option<QrClaims> {
        decode::<QrClaims>(
            payload,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .ok()
        .map(|data| data.claims)
    }

    /// 출석 요청의 `code` 필드를 해석합니다.
    ///
    /// 숫자로만 이루어져 있으면 PIN, 그 밖에는 QR 페이로드로 봅니다.
    ///
    /// ## 에러
    /// - `InvalidInput`: 비어 있거나 지나치게 긴 값
    /// - `InvalidOrExpiredCode`: 검증할 수 없는 QR 페이로드
    pub fn parse(&self, raw: &str) -> Result<PresentedCode, AppError> {
        let raw = raw.trim();

        if raw.is_empty() {
            return Err(AppError::InvalidInput("Code is required".to_string()));
        }
        if raw.len() > MAX_PRESENTED_CODE_LEN {
            return Err(AppError::InvalidInput("Code is too long".to_string()));
        }

        if raw.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(PresentedCode::Pin(raw.to_string()));
        }

        let claims = self.read_qr(raw).ok_or(AppError::InvalidOrExpiredCode)?;
        Ok(PresentedCode::Qr {
            session_id: claims.sid,
            code: claims.code,
        })
    }
}
