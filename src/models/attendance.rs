//! # 출석 이벤트 모델 정의
//!
//! 출석 처리(redeem) 요청과 응답, 그리고 소유자가 보는 실시간 출석 현황을 정의합니다.

use serde::{Deserialize, Serialize};

/// 출석 이벤트: `attendance_events` 테이블 한 행
///
/// 출석 처리에 성공했을 때만 만들어지고, 이후 수정되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceEvent {
    /// 커밋 순서 번호
    pub seq: i64,
    pub id: String,
    pub session_id: String,
    /// 명부 항목 ID (제시된 토큰 원문이 아님)
    pub identity_id: String,
    pub recorded_at: String,
}

/// 출석 요청: `POST /api/v1/redeem`의 요청 본문
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// 숫자 PIN 또는 QR 페이로드
    pub code: String,
    /// 명부 ID 또는 이메일
    pub presented_identity_token: String,
    /// 자동 등록 시 사용할 표시 이름 (선택)
    pub display_name: Option<String>,
}

/// 출석 성공 결과
#[derive(Debug, Clone, Serialize)]
pub struct RedeemReceipt {
    pub event_id: String,
    pub session_id: String,
    pub session_label: String,
    pub identity_id: String,
    pub display_name: Option<String>,
    pub recorded_at: String,
    /// 사람이 읽을 확인 메시지
    pub message: String,
}

/// 출석한 학생 한 명: 실시간 현황 목록의 한 줄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Attendee {
    /// 다음 폴링에 `after`로 넘길 커서
    pub seq: i64,
    pub identity_id: String,
    pub display_name: String,
    pub recorded_at: String,
}

/// 실시간 출석 현황: `GET /api/v1/sessions/{id}/attendance`의 응답
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceSnapshot {
    pub session_id: String,
    pub active: bool,
    /// 지금까지 커밋된 전체 출석 수
    pub count: i64,
    /// `after` 이후에 커밋된 출석자 (없으면 전체)
    pub attendees: Vec<Attendee>,
    /// 이번 응답까지 받은 마지막 `seq`. 다음 폴링의 `after`로 그대로 넘깁니다.
    pub cursor: i64,
}

/// 현황 조회 쿼리 파라미터
#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    /// 이 `seq` 이후에 커밋된 출석자만 목록에 포함
    pub after: Option<i64>,
}
