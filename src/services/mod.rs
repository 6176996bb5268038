//! # 서비스 계층
//!
//! 라우트 핸들러와 DB 접근 계층 사이의 출석 도메인 로직입니다.
//! 모든 함수는 요청 사이에 공유하는 메모리 상태 없이 동작하며,
//! 요청 간 조정은 DB의 원자적 연산에 맡깁니다.
//!
//! - `codes`: PIN 생성과 QR 페이로드 서명/검증
//! - `identity`: 제시된 신원 토큰을 명부 항목으로 확인 (필요하면 등록)
//! - `authz`: 세션 열기 권한과 소유자 확인
//! - `lifecycle`: 세션 열기(기존 세션 대체)/종료/코드 회전/조회
//! - `redemption`: 코드 + 신원으로 출석 한 번 기록
//! - `observer`: 소유자용 실시간 출석 현황 (읽기 전용)
//! - `sweeper`: 종료 예정 시각이 지난 세션 정리

pub mod authz;
pub mod codes;
pub mod identity;
pub mod lifecycle;
pub mod observer;
pub mod redemption;
pub mod sweeper;

pub use authz::{Authorizer, RoleAuthorizer};
pub use codes::{CodeIssuer, PresentedCode};
pub use identity::{IdentityResolver, SqliteRoster};
pub use redemption::RedeemOptions;
