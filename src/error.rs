//! 에러 타입 정의

use thiserror::Error;

/// RTCM 중계 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("유효하지 않은 프레임: length={length}, capacity={capacity}")]
    InvalidFrame { length: usize, capacity: usize },

    #[error("MAVLink 패킷 에러: {0}")]
    Mavlink(String),

    #[error("MAVLink 체크섬 불일치: expected {expected:04X}, got {got:04X}")]
    ChecksumMismatch { expected: u16, got: u16 },

    #[error("링크 스레드 전달 타임아웃: {timeout_ms}ms")]
    HandoffTimeout { timeout_ms: u64 },

    #[error("연결 종료")]
    ConnectionClosed,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
