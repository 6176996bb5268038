//! # 출석 세션 모델 정의
//!
//! 교사(소유자)가 여는 짧은 출석 세션을 표현합니다.
//!
//! ## 세션 흐름
//! 1. 소유자가 `OpenSessionRequest`로 세션을 엽니다 (같은 소유자의 기존 활성 세션은 자동 종료)
//! 2. 응답의 PIN 코드나 QR 페이로드를 학생들에게 보여줍니다
//! 3. 소유자가 닫거나, 예정된 종료 시각이 지나면 더 이상 출석할 수 없습니다
//!
//! 세션 행은 삭제하지 않고 이력으로 남겨둡니다.

use serde::{Deserialize, Serialize};

/// 출석 세션 엔티티: DB의 `attendance_sessions` 테이블 한 행에 대응합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceSession {
    /// 세션 고유 식별자 (UUIDv7)
    pub id: String,
    /// 세션을 연 소유자의 ID (액세스 토큰의 `sub`)
    pub owner_id: String,
    /// 세션 설명 (예: 과목 이름)
    pub label: String,
    /// 현재 PIN 코드: 회전(rotate)하면 바뀝니다
    pub code: String,
    /// 세션이 열린 시각 (ISO 8601 형식: "2026-02-16T12:00:00.000Z")
    pub opened_at: String,
    /// 종료 시각: 열린 상태면 None이거나, 예정된 만료 시각(미래)일 수 있습니다
    pub closed_at: Option<String>,
    /// 출석을 받을 수 있는 상태인지 여부
    pub active: bool,
}

/// 세션 열기 요청: `POST /api/v1/sessions`의 요청 본문
#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    /// 세션 설명 (필수, 공백만으로는 안 됨)
    pub label: String,
    /// 예정된 유지 시간(초). 음수면 이미 만료된 세션이 만들어집니다.
    pub duration_secs: Option<i64>,
}

/// 세션 열기/조회/코드 회전 응답
///
/// `qr_payload`는 저장하지 않고 응답할 때마다 서명해서 만듭니다.
/// 페이로드 안에 현재 PIN이 들어 있으므로, 회전하면 이전 QR은 쓸 수 없게 됩니다.
/// 닫힌 세션에는 QR 페이로드가 없습니다.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: AttendanceSession,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
}
