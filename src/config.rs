//! 중계 설정

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, DEFAULT_BANDWIDTH_WINDOW_MS, MAX_FRAME_PAYLOAD};

/// RTCM 중계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 프레임당 페이로드 용량 (바이트, 1 ~ 180)
    pub frame_payload_capacity: usize,

    /// 대역폭 샘플링 윈도우 (밀리초)
    pub bandwidth_window_ms: u64,

    /// 송신측 MAVLink 시스템 ID
    pub system_id: u8,

    /// 송신측 MAVLink 컴포넌트 ID
    pub component_id: u8,

    /// 링크 스레드로 프레임을 넘길 때 최대 대기 시간 (밀리초)
    pub handoff_timeout_ms: u64,

    /// 링크 스레드 큐 크기 (프레임 수)
    pub link_queue_capacity: usize,

    /// 수신 blob을 hex로 trace 로그에 남김
    pub log_payload: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_payload_capacity: MAX_FRAME_PAYLOAD,
            bandwidth_window_ms: DEFAULT_BANDWIDTH_WINDOW_MS,
            system_id: 255,         // GCS
            component_id: 190,      // MAV_COMP_ID_MISSIONPLANNER
            handoff_timeout_ms: 20,
            link_queue_capacity: 64,
            log_payload: false,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 샘플링 윈도우
    pub fn bandwidth_window(&self) -> Duration {
        Duration::from_millis(self.bandwidth_window_ms)
    }

    /// 링크 전달 타임아웃
    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.frame_payload_capacity == 0 || self.frame_payload_capacity > MAX_FRAME_PAYLOAD {
            return Err(Error::InvalidConfig(format!(
                "frame_payload_capacity must be 1..={}, got {}",
                MAX_FRAME_PAYLOAD, self.frame_payload_capacity
            )));
        }
        if self.bandwidth_window_ms == 0 {
            return Err(Error::InvalidConfig(
                "bandwidth_window_ms must be non-zero".to_string(),
            ));
        }
        if self.link_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "link_queue_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// 지연 최소화용 설정 (짧은 전달 대기)
    pub fn low_latency() -> Self {
        Self {
            handoff_timeout_ms: 5,
            link_queue_capacity: 16,
            ..Self::default()
        }
    }

    /// 디버깅용 설정 (페이로드 덤프)
    pub fn debug() -> Self {
        Self {
            log_payload: true,
            ..Self::default()
        }
    }
}
