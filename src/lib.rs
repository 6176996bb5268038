//! # Rollcall
//!
//! 실시간 출석 세션 검증 서버입니다.
//! 교사가 세션을 열면 짧은 PIN과 서명된 QR 페이로드가 발급되고,
//! 학생은 코드와 신원 토큰을 제시해 세션당 한 번 출석합니다.
//!
//! 계층 구조:
//! ```text
//! routes (HTTP) → services (도메인 로직) → db (SQL 쿼리) → SQLite
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub mod test_support;
