//! 중계 통계
//!
//! 디스패치 결과는 반환값이 아니라 이 카운터와 로그로만 관찰된다.

use std::sync::atomic::{AtomicU64, Ordering};

/// 디스패치 카운터
#[derive(Debug, Default)]
pub struct DispatchStats {
    frames: AtomicU64,
    empty_dispatches: AtomicU64,
    sends: AtomicU64,
    send_failures: AtomicU64,
    skipped_destinations: AtomicU64,
}

/// `DispatchStats` 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    /// 디스패치된 프레임 수
    pub frames: u64,

    /// 목적지가 하나도 없던 디스패치 수
    pub empty_dispatches: u64,

    /// 송신 시도 수 (링크가 해석된 목적지)
    pub sends: u64,

    /// 송신 실패 수
    pub send_failures: u64,

    /// 링크가 없어 건너뛴 목적지 수
    pub skipped_destinations: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty(&self) {
        self.empty_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send(&self, ok: bool) {
        self.sends.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.send_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_skip(&self) {
        self.skipped_destinations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            empty_dispatches: self.empty_dispatches.load(Ordering::Relaxed),
            sends: self.sends.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            skipped_destinations: self.skipped_destinations.load(Ordering::Relaxed),
        }
    }
}

/// 입력 측 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// 수신 blob 수
    pub blobs: u64,

    /// 수신 바이트
    pub bytes: u64,

    /// 생성 프레임 수
    pub frames: u64,

    /// 분할된 blob 수
    pub fragmented_blobs: u64,

    /// 마지막 대역폭 샘플 (B/s)
    pub last_rate: Option<u64>,
}

impl RelayStats {
    /// blob당 평균 프레임 수
    pub fn frames_per_blob(&self) -> f64 {
        if self.blobs == 0 {
            return 0.0;
        }
        self.frames as f64 / self.blobs as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self, dispatch: &DispatchSnapshot) -> String {
        format!(
            "Blobs: {} | Bytes: {} | Frames: {} ({} fragmented blobs) | Rate: {} | Sends: {} (failed {}, skipped {}, empty {})",
            self.blobs,
            self.bytes,
            self.frames,
            self.fragmented_blobs,
            self.last_rate
                .map(|r| format!("{} B/s", r))
                .unwrap_or_else(|| "-".to_string()),
            dispatch.sends,
            dispatch.send_failures,
            dispatch.skipped_destinations,
            dispatch.empty_dispatches,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_counters() {
        let stats = DispatchStats::new();
        stats.record_frame();
        stats.record_send(true);
        stats.record_send(false);
        stats.record_skip();
        stats.record_empty();

        let snap = stats.snapshot();
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.sends, 2);
        assert_eq!(snap.send_failures, 1);
        assert_eq!(snap.skipped_destinations, 1);
        assert_eq!(snap.empty_dispatches, 1);
    }

    #[test]
    fn test_summary() {
        let stats = RelayStats {
            blobs: 2,
            bytes: 500,
            frames: 4,
            fragmented_blobs: 1,
            last_rate: Some(250),
        };
        assert_eq!(stats.frames_per_blob(), 2.0);

        let summary = stats.summary(&DispatchSnapshot::default());
        assert!(summary.contains("Blobs: 2"));
        assert!(summary.contains("250 B/s"));
    }
}
