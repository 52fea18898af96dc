//! 입력 대역폭 샘플링
//!
//! blob 도착 이벤트마다 바이트를 누적하고, 윈도우가 지난 뒤 첫 도착 시점에
//! bytes/sec 를 계산해 발행한다. 백그라운드 타이머는 없다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::debug;

/// 단조 시계
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// `Instant::now()` 기반 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 대역폭 샘플 수신자 (fire-and-forget)
pub trait RateSink: Send + Sync {
    fn publish_rate(&self, bytes_per_second: u64);
}

/// 마지막 샘플만 보관하는 수신자
#[derive(Debug, Default)]
pub struct LatestRate {
    value: AtomicU64,
    samples: AtomicU64,
}

impl LatestRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 마지막으로 발행된 B/s (샘플이 없으면 None)
    pub fn get(&self) -> Option<u64> {
        if self.samples.load(Ordering::Acquire) == 0 {
            return None;
        }
        Some(self.value.load(Ordering::Relaxed))
    }

    /// 발행된 샘플 수
    pub fn sample_count(&self) -> u64 {
        self.samples.load(Ordering::Acquire)
    }
}

impl RateSink for LatestRate {
    fn publish_rate(&self, bytes_per_second: u64) {
        self.value.store(bytes_per_second, Ordering::Relaxed);
        self.samples.fetch_add(1, Ordering::Release);
    }
}

impl RateSink for watch::Sender<u64> {
    fn publish_rate(&self, bytes_per_second: u64) {
        // 구독자가 없어도 값은 갱신
        self.send_replace(bytes_per_second);
    }
}

/// 윈도우 기반 바이트율 추정기
pub struct BandwidthSampler {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn RateSink>,
    window: Duration,
    window_start: Option<Instant>,
    byte_total: u64,
}

impl BandwidthSampler {
    /// 생성과 동시에 윈도우 시작
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn RateSink>, window: Duration) -> Self {
        let mut sampler = Self::unstarted(clock, sink, window);
        sampler.start();
        sampler
    }

    /// 시작되지 않은 샘플러. `start()` 전까지 도착 기록은 무시됨
    pub fn unstarted(clock: Arc<dyn Clock>, sink: Arc<dyn RateSink>, window: Duration) -> Self {
        Self {
            clock,
            sink,
            window,
            window_start: None,
            byte_total: 0,
        }
    }

    /// 윈도우 (재)시작
    pub fn start(&mut self) {
        self.window_start = Some(self.clock.now());
        self.byte_total = 0;
    }

    pub fn is_started(&self) -> bool {
        self.window_start.is_some()
    }

    /// 현재 윈도우 누적 바이트
    pub fn byte_total(&self) -> u64 {
        self.byte_total
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// blob 도착 기록. 샘플이 발행되면 그 값을 반환
    pub fn on_blob_arrival(&mut self, byte_count: usize) -> Option<u64> {
        let window_start = self.window_start?;

        self.byte_total = self.byte_total.saturating_add(byte_count as u64);

        let now = self.clock.now();
        let elapsed_ms = now.saturating_duration_since(window_start).as_millis() as u64;
        if elapsed_ms <= self.window.as_millis() as u64 {
            return None;
        }

        let bytes_per_second = self.byte_total.saturating_mul(1000) / elapsed_ms;
        self.sink.publish_rate(bytes_per_second);

        debug!(
            "RTCM bandwidth: {} B/s ({:.2} kB/s)",
            bytes_per_second,
            bytes_per_second as f64 / 1024.0
        );

        self.window_start = Some(now);
        self.byte_total = 0;

        Some(bytes_per_second)
    }
}

/// 테스트용 수동 시계
#[cfg(test)]
pub(crate) struct ManualClock {
    now: parking_lot::Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: parking_lot::Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(clock: &Arc<ManualClock>, sink: &Arc<LatestRate>) -> BandwidthSampler {
        BandwidthSampler::new(clock.clone(), sink.clone(), Duration::from_millis(1000))
    }

    #[test]
    fn test_no_sample_within_window() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(LatestRate::new());
        let mut sampler = sampler(&clock, &sink);

        clock.advance(Duration::from_millis(400));
        assert_eq!(sampler.on_blob_arrival(500), None);
        clock.advance(Duration::from_millis(600));
        // 정확히 1000ms 는 윈도우 초과가 아님
        assert_eq!(sampler.on_blob_arrival(500), None);

        assert_eq!(sampler.byte_total(), 1000);
        assert_eq!(sink.get(), None);
    }

    #[test]
    fn test_sample_after_window() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(LatestRate::new());
        let mut sampler = sampler(&clock, &sink);

        clock.advance(Duration::from_millis(500));
        sampler.on_blob_arrival(1000);
        clock.advance(Duration::from_millis(750));
        let rate = sampler.on_blob_arrival(1500);

        // 2500 * 1000 / 1250
        assert_eq!(rate, Some(2000));
        assert_eq!(sink.get(), Some(2000));
        assert_eq!(sampler.byte_total(), 0);
    }

    #[test]
    fn test_integer_division() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(LatestRate::new());
        let mut sampler = sampler(&clock, &sink);

        clock.advance(Duration::from_millis(1001));
        // 1000 * 1000 / 1001 = 999.000999...
        assert_eq!(sampler.on_blob_arrival(1000), Some(999));
    }

    #[test]
    fn test_window_resets_after_sample() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(LatestRate::new());
        let mut sampler = sampler(&clock, &sink);

        clock.advance(Duration::from_millis(1500));
        assert_eq!(sampler.on_blob_arrival(3000), Some(2000));

        clock.advance(Duration::from_millis(900));
        assert_eq!(sampler.on_blob_arrival(100), None);
        clock.advance(Duration::from_millis(200));
        assert_eq!(sampler.on_blob_arrival(1000), Some(1000));
        assert_eq!(sink.sample_count(), 2);
    }

    #[test]
    fn test_idle_period_emits_nothing() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(LatestRate::new());
        let _sampler = sampler(&clock, &sink);

        clock.advance(Duration::from_secs(10));
        assert_eq!(sink.sample_count(), 0);
    }

    #[test]
    fn test_zero_byte_arrival_reports_zero() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(LatestRate::new());
        let mut sampler = sampler(&clock, &sink);

        clock.advance(Duration::from_millis(2000));
        assert_eq!(sampler.on_blob_arrival(0), Some(0));
        assert_eq!(sink.get(), Some(0));
    }

    #[test]
    fn test_unstarted_is_noop() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(LatestRate::new());
        let mut sampler =
            BandwidthSampler::unstarted(clock.clone(), sink.clone(), Duration::from_secs(1));

        clock.advance(Duration::from_secs(5));
        assert_eq!(sampler.on_blob_arrival(5000), None);
        assert_eq!(sampler.byte_total(), 0);
        assert!(!sampler.is_started());

        sampler.start();
        clock.advance(Duration::from_millis(2000));
        assert_eq!(sampler.on_blob_arrival(5000), Some(2500));
    }

    #[test]
    fn test_watch_sink() {
        let (tx, rx) = watch::channel(0u64);
        let clock = Arc::new(ManualClock::new());
        let mut sampler =
            BandwidthSampler::new(clock.clone(), Arc::new(tx), Duration::from_secs(1));

        clock.advance(Duration::from_millis(1250));
        sampler.on_blob_arrival(500);
        assert_eq!(*rx.borrow(), 400);
    }
}
