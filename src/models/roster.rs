use serde::{Deserialize, Serialize};

/// 명부 항목: `roster_entries` 테이블 한 행
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RosterEntry {
    pub id: String,
    pub display_name: String,
    /// 소문자로 정규화된 연락처 토큰 (이메일)
    #[serde(skip_serializing)]
    pub contact_token: String,
    pub created_at: String,
}

/// 신원 확인 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// 명부 항목의 정식 ID
    pub identity_id: String,
    /// 이번 호출에서 새로 등록되었는지 여부
    pub created: bool,
}
