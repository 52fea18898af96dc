//! RTCM 중계기
//!
//! - blob 도착마다 대역폭 샘플링 (목적지 유무와 무관)
//! - blob 분할 후 프레임 순서대로 모든 목적지에 전송
//! - blob 하나는 분할과 전송이 끝날 때까지 다음 blob과 섞이지 않음

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, enabled, trace, Level};

use crate::bandwidth::{BandwidthSampler, Clock, RateSink, SystemClock};
use crate::destination::DestinationRegistry;
use crate::dispatcher::Dispatcher;
use crate::frame::RtcmFramer;
use crate::stats::{DispatchSnapshot, RelayStats};
use crate::transport::SourceId;
use crate::{Config, Result};

/// 단일 생산자 상태 (락 안에서만 변경)
struct RelayState {
    framer: RtcmFramer,
    sampler: BandwidthSampler,
    stats: RelayStats,
}

/// RTCM 중계기
pub struct RtcmRelay<R: DestinationRegistry> {
    config: Config,
    registry: Arc<R>,
    dispatcher: Dispatcher,
    state: Mutex<RelayState>,
}

impl<R: DestinationRegistry> RtcmRelay<R> {
    /// 시스템 시계로 중계기 생성
    pub fn new(config: Config, registry: Arc<R>, rate_sink: Arc<dyn RateSink>) -> Result<Self> {
        Self::with_clock(config, registry, rate_sink, Arc::new(SystemClock))
    }

    /// 시계 지정 생성
    pub fn with_clock(
        config: Config,
        registry: Arc<R>,
        rate_sink: Arc<dyn RateSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let framer = RtcmFramer::with_capacity(config.frame_payload_capacity)?;
        let sampler = BandwidthSampler::new(clock, rate_sink, config.bandwidth_window());
        let dispatcher = Dispatcher::new(SourceId::from_config(&config));

        debug!(
            "RTCM relay 생성: capacity={}, window={}ms, source={}/{}",
            config.frame_payload_capacity,
            config.bandwidth_window_ms,
            config.system_id,
            config.component_id
        );

        Ok(Self {
            config,
            registry,
            dispatcher,
            state: Mutex::new(RelayState {
                framer,
                sampler,
                stats: RelayStats::default(),
            }),
        })
    }

    /// RTCM blob 수신 처리
    pub fn rtcm_data_update(&self, blob: Bytes) {
        let mut state = self.state.lock();

        if let Some(rate) = state.sampler.on_blob_arrival(blob.len()) {
            state.stats.last_rate = Some(rate);
        }

        if self.config.log_payload && enabled!(Level::TRACE) {
            let hex: String = blob.iter().map(|b| format!("{:02x}", b)).collect();
            trace!("Received RTCM data: {} bytes - {}", blob.len(), hex);
        }

        let frames = state.framer.frame(&blob);

        state.stats.blobs += 1;
        state.stats.bytes += blob.len() as u64;
        state.stats.frames += frames.len() as u64;
        if frames.iter().any(|f| f.flags().is_fragmented()) {
            state.stats.fragmented_blobs += 1;
        }

        for frame in &frames {
            self.dispatcher.dispatch(self.registry.as_ref(), frame);
        }
    }

    /// 다음 blob의 시퀀스 번호
    pub fn sequence(&self) -> u8 {
        self.state.lock().framer.sequence()
    }

    pub fn stats(&self) -> RelayStats {
        self.state.lock().stats
    }

    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.dispatcher.snapshot()
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        self.stats().summary(&self.dispatch_stats())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }
}
