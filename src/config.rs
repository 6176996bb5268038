//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `JWT_SECRET`: 액세스 토큰 검증과 QR 페이로드 서명에 쓰는 비밀키 (필수)
//! - `HOST`, `PORT`: 서버 바인딩 주소
//! - `DB_MAX_CONNECTIONS`: 연결 풀 크기
//! - `PIN_LENGTH`: PIN 코드 자릿수 (4~8)
//! - `QR_TTL_SECS`: 종료 예정 시각이 없는 세션의 QR 페이로드 유효 시간
//! - `REDEEM_TIMEOUT_MS`: 출석 처리(조회 + 신원 확인) 제한 시간
//! - `SWEEP_INTERVAL_SECS`: 만료 세션 정리 주기 (0이면 비활성화)
//! - `ALLOW_SELF_REGISTER`: 명부에 없는 학생의 자동 등록 허용 여부
//! - `OPENER_ROLES`: 세션을 열 수 있는 토큰 역할 목록 (쉼표 구분)

use std::env;
use std::str::FromStr;

/// PIN 자릿수의 허용 범위
const PIN_LENGTH_RANGE: (usize, usize) = (4, 8);

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/rollcall.db")
    pub database_url: String,
    /// JWT 서명/검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
    /// 연결 풀의 최대 연결 수 (기본값: 5)
    pub db_max_connections: u32,
    /// PIN 코드 자릿수 (기본값: 5)
    pub pin_length: usize,
    /// QR 페이로드 기본 유효 시간(초)
    pub qr_ttl_secs: i64,
    /// 출석 처리 제한 시간(밀리초)
    pub redeem_timeout_ms: u64,
    /// 만료 세션 정리 주기(초). 0이면 정리 태스크를 띄우지 않습니다.
    pub sweep_interval_secs: u64,
    /// 명부에 없는 학생을 첫 출석 때 등록할지 여부
    pub allow_self_register: bool,
    /// 세션을 열 수 있는 역할 목록
    pub opener_roles: Vec<String>,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있고, 파싱할 수 없는 값도 기본값으로 대체됩니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        let (min_pin, max_pin) = PIN_LENGTH_RANGE;

        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5),
            pin_length: parse_or("PIN_LENGTH", 5usize).clamp(min_pin, max_pin),
            qr_ttl_secs: parse_or("QR_TTL_SECS", 43_200),
            redeem_timeout_ms: parse_or("REDEEM_TIMEOUT_MS", 5_000),
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", 60),
            allow_self_register: parse_or("ALLOW_SELF_REGISTER", true),
            opener_roles: parse_roles(
                &env::var("OPENER_ROLES").unwrap_or_else(|_| "instructor,admin".to_string()),
            ),
        })
    }
}

/// 환경변수를 읽어 `T`로 파싱하고, 없거나 잘못된 값이면 기본값을 돌려줍니다.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// "instructor, Admin,," → ["instructor", "admin"]
fn parse_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|role| role.trim().to_ascii_lowercase())
        .filter(|role| !role.is_empty())
        .collect()
}
