//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! - `session`: 출석 세션과 세션 열기/응답 구조체
//! - `attendance`: 출석 이벤트, 출석 요청/응답, 실시간 현황 구조체
//! - `roster`: 명부 항목과 신원 확인 결과
//!
//! `pub use X::*;`로 하위 모듈의 항목을 재공개하여
//! `crate::models::AttendanceSession`처럼 짧게 접근할 수 있게 합니다.

pub mod attendance;
pub mod roster;
pub mod session;

pub use attendance::*;
pub use roster::*;
pub use session::*;
