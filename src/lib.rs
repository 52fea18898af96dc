//! # RTCM Relay
//!
//! RTCM 보정 데이터를 고정 크기 프레임으로 분할해 여러 목적지로 중계하는 코어
//!
//! ## 핵심 특징
//! - **프레이밍**: 임의 크기 blob을 최대 180바이트 프레임으로 분할, 플래그로 조각/시퀀스 표시
//! - **비분할 fast path**: 용량 미만 blob은 단일 프레임, 분할 비트 0
//! - **대역폭 샘플링**: 1초 윈도우 단위로 입력 바이트율(B/s) 발행
//! - **멀티 목적지 디스패치**: 현재 알려진 모든 목적지로 전송, 링크 없는 목적지는 건너뜀
//! - **MAVLink v2 캡슐화**: `GPS_RTCM_DATA` 메시지로 UDP 전송

pub mod bandwidth;
pub mod config;
pub mod destination;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod mavlink;
pub mod relay;
pub mod stats;
pub mod transport;

pub use bandwidth::{BandwidthSampler, Clock, LatestRate, RateSink, SystemClock};
pub use config::Config;
pub use destination::{Destination, DestinationRegistry, DestinationTable, Link};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use frame::{Frame, FrameFlags, RtcmFramer};
pub use relay::RtcmRelay;
pub use stats::{DispatchStats, RelayStats};
pub use transport::{QueuedTransport, SourceId, Transport, UdpTransport, WireEncoding};

/// 프레임 하나가 담을 수 있는 최대 페이로드 (MAVLink `GPS_RTCM_DATA.data` 길이)
pub const MAX_FRAME_PAYLOAD: usize = 180;

/// 프레임 헤더 크기 (length + flags)
pub const FRAME_HEADER_SIZE: usize = 2;

/// 와이어 상의 프레임 전체 크기
pub const WIRE_FRAME_SIZE: usize = FRAME_HEADER_SIZE + MAX_FRAME_PAYLOAD;

/// 시퀀스 번호 주기 (5비트)
pub const SEQUENCE_MODULUS: u8 = 32;

/// 조각 ID 주기 (2비트)
pub const FRAGMENT_ID_MODULUS: u8 = 4;

/// 기본 대역폭 샘플링 윈도우 (밀리초)
pub const DEFAULT_BANDWIDTH_WINDOW_MS: u64 = 1000;
