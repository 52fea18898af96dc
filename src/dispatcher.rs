//! Dispatcher - 프레임을 현재 알려진 모든 목적지로 fan-out

use std::sync::Arc;

use tracing::{debug, warn};

use crate::destination::DestinationRegistry;
use crate::frame::Frame;
use crate::stats::{DispatchSnapshot, DispatchStats};
use crate::transport::SourceId;

/// 목적지별 독립 송신 디스패처
///
/// 목적지 목록은 호출마다 새로 조회하고, 링크가 없거나 송신에 실패한 목적지는
/// 건너뛴 채 나머지를 계속 시도한다. 호출자에게는 실패를 반환하지 않는다.
pub struct Dispatcher {
    source: SourceId,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            stats: Arc::new(DispatchStats::new()),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// 카운터 공유 핸들
    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }

    /// 프레임 하나를 모든 목적지로 전송
    pub fn dispatch<R>(&self, registry: &R, frame: &Frame)
    where
        R: DestinationRegistry + ?Sized,
    {
        self.stats.record_frame();

        let destinations = registry.list_destinations();
        debug!(
            "RTCM 프레임 전송: {} 목적지, len={}, {:?}",
            destinations.len(),
            frame.length(),
            frame.flags()
        );

        if destinations.is_empty() {
            debug!("연결된 목적지 없음 - RTCM 프레임 미전송");
            self.stats.record_empty();
            return;
        }

        for destination in &destinations {
            let link = match registry.resolve_transport(destination) {
                Some(link) => link,
                None => {
                    debug!("목적지 {} 링크 없음 - 건너뜀", destination.id);
                    self.stats.record_skip();
                    continue;
                }
            };

            match link.transport.send(frame, self.source, link.channel) {
                Ok(()) => {
                    self.stats.record_send(true);
                }
                Err(e) => {
                    warn!(
                        "목적지 {} 송신 실패 (channel={}): {}",
                        destination.id, link.channel, e
                    );
                    self.stats.record_send(false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parking_lot::Mutex;

    use crate::destination::{Destination, DestinationTable, Link};
    use crate::frame::RtcmFramer;
    use crate::transport::tests::RecordingTransport;

    fn frame() -> Frame {
        RtcmFramer::new().frame(&Bytes::from_static(b"rtcm3"))[0].clone()
    }

    #[test]
    fn test_empty_registry_is_noop() {
        let dispatcher = Dispatcher::new(SourceId::default());
        let table = DestinationTable::new();

        dispatcher.dispatch(&table, &frame());

        let snap = dispatcher.snapshot();
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.sends, 0);
        assert_eq!(snap.empty_dispatches, 1);
    }

    #[test]
    fn test_unresolved_destinations_skipped() {
        let dispatcher = Dispatcher::new(SourceId::default());
        let table = DestinationTable::new();
        let transports: Vec<Arc<RecordingTransport>> =
            (0..3).map(|_| Arc::new(RecordingTransport::default())).collect();

        // 5개 중 2개는 링크 없음
        table.add_destination(
            Destination::new(1, "a"),
            Some(Link::new(0, transports[0].clone())),
        );
        table.add_destination(Destination::new(2, "b"), None);
        table.add_destination(
            Destination::new(3, "c"),
            Some(Link::new(1, transports[1].clone())),
        );
        table.add_destination(Destination::new(4, "d"), None);
        table.add_destination(
            Destination::new(5, "e"),
            Some(Link::new(2, transports[2].clone())),
        );

        let frame = frame();
        dispatcher.dispatch(&table, &frame);

        let snap = dispatcher.snapshot();
        assert_eq!(snap.sends, 3);
        assert_eq!(snap.skipped_destinations, 2);
        for (channel, transport) in transports.iter().enumerate() {
            let sent = transport.sent.lock();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].0, frame);
            assert_eq!(sent[0].2, channel as u8);
        }
    }

    #[test]
    fn test_failure_does_not_stop_iteration() {
        let dispatcher = Dispatcher::new(SourceId {
            system_id: 1,
            component_id: 2,
        });
        let table = DestinationTable::new();
        let failing = Arc::new(RecordingTransport::failing());
        let ok = Arc::new(RecordingTransport::default());

        table.add_destination(Destination::new(1, "bad"), Some(Link::new(0, failing)));
        table.add_destination(Destination::new(2, "good"), Some(Link::new(1, ok.clone())));

        dispatcher.dispatch(&table, &frame());

        let snap = dispatcher.snapshot();
        assert_eq!(snap.sends, 2);
        assert_eq!(snap.send_failures, 1);
        assert_eq!(ok.count(), 1);
        assert_eq!(
            ok.sent.lock()[0].1,
            SourceId {
                system_id: 1,
                component_id: 2
            }
        );
    }

    /// 조회할 때마다 목록이 바뀌는 레지스트리
    struct ShrinkingRegistry {
        remaining: Mutex<Vec<Destination>>,
        transport: Arc<RecordingTransport>,
    }

    impl DestinationRegistry for ShrinkingRegistry {
        fn list_destinations(&self) -> Vec<Destination> {
            let mut remaining = self.remaining.lock();
            let snapshot = remaining.clone();
            remaining.pop();
            snapshot
        }

        fn resolve_transport(&self, _destination: &Destination) -> Option<Link> {
            Some(Link::new(0, self.transport.clone()))
        }
    }

    #[test]
    fn test_registry_queried_per_dispatch() {
        let transport = Arc::new(RecordingTransport::default());
        let registry = ShrinkingRegistry {
            remaining: Mutex::new(vec![Destination::new(1, "a"), Destination::new(2, "b")]),
            transport: transport.clone(),
        };
        let dispatcher = Dispatcher::new(SourceId::default());

        dispatcher.dispatch(&registry, &frame());
        dispatcher.dispatch(&registry, &frame());
        dispatcher.dispatch(&registry, &frame());

        assert_eq!(transport.count(), 3);
        assert_eq!(dispatcher.snapshot().empty_dispatches, 1);
    }
}
