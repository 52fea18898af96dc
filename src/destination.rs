//! 목적지 관리
//!
//! 디스패치마다 새로 조회되는 목적지 목록과 목적지별 링크 해석

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::transport::Transport;

/// 목적지 (프레임을 받을 피어)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// 목적지 ID (MAVLink 기체 ID)
    pub id: u8,

    /// 표시용 이름
    pub name: String,
}

impl Destination {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// 목적지의 활성 링크
#[derive(Clone)]
pub struct Link {
    /// 채널 번호 (송신 시 routing id)
    pub channel: u8,

    /// 송신 primitive
    pub transport: Arc<dyn Transport>,
}

impl Link {
    pub fn new(channel: u8, transport: Arc<dyn Transport>) -> Self {
        Self { channel, transport }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("channel", &self.channel).finish()
    }
}

/// 목적지 레지스트리 (외부 소유)
pub trait DestinationRegistry: Send + Sync {
    /// 현재 목적지 목록 스냅샷 (순서 유지)
    fn list_destinations(&self) -> Vec<Destination>;

    /// 목적지의 활성 링크. 없으면 None
    fn resolve_transport(&self, destination: &Destination) -> Option<Link>;
}

struct Entry {
    destination: Destination,
    link: Option<Link>,
}

/// 프로세스 내 목적지 테이블
///
/// 추가 순서대로 순회하며, 링크는 목적지와 별개로 붙였다 뗄 수 있다.
#[derive(Default)]
pub struct DestinationTable {
    entries: RwLock<Vec<Entry>>,
}

impl DestinationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 목적지 추가. 같은 ID가 있으면 교체
    pub fn add_destination(&self, destination: Destination, link: Option<Link>) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.destination.id == destination.id) {
            entry.destination = destination;
            entry.link = link;
            return;
        }

        debug!("목적지 추가: {} ({})", destination.id, destination.name);
        entries.push(Entry { destination, link });
    }

    /// 목적지 제거
    pub fn remove_destination(&self, id: u8) -> Option<Destination> {
        let mut entries = self.entries.write();
        let idx = entries.iter().position(|e| e.destination.id == id)?;
        Some(entries.remove(idx).destination)
    }

    /// 링크 연결. 목적지가 없으면 false
    pub fn set_link(&self, id: u8, link: Link) -> bool {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.destination.id == id) {
            Some(entry) => {
                entry.link = Some(link);
                true
            }
            None => false,
        }
    }

    /// 링크 해제 (목적지는 유지)
    pub fn clear_link(&self, id: u8) -> Option<Link> {
        let mut entries = self.entries.write();
        entries
            .iter_mut()
            .find(|e| e.destination.id == id)
            .and_then(|e| e.link.take())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// 링크가 붙은 목적지 수
    pub fn linked_count(&self) -> usize {
        self.entries.read().iter().filter(|e| e.link.is_some()).count()
    }
}

impl DestinationRegistry for DestinationTable {
    fn list_destinations(&self) -> Vec<Destination> {
        self.entries
            .read()
            .iter()
            .map(|e| e.destination.clone())
            .collect()
    }

    fn resolve_transport(&self, destination: &Destination) -> Option<Link> {
        self.entries
            .read()
            .iter()
            .find(|e| e.destination.id == destination.id)
            .and_then(|e| e.link.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::RecordingTransport;

    fn link(channel: u8) -> Link {
        Link::new(channel, Arc::new(RecordingTransport::default()))
    }

    #[test]
    fn test_insertion_order() {
        let table = DestinationTable::new();
        table.add_destination(Destination::new(3, "c"), None);
        table.add_destination(Destination::new(1, "a"), Some(link(0)));
        table.add_destination(Destination::new(2, "b"), None);

        let ids: Vec<u8> = table.list_destinations().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(table.linked_count(), 1);
    }

    #[test]
    fn test_replace_same_id() {
        let table = DestinationTable::new();
        table.add_destination(Destination::new(1, "old"), None);
        table.add_destination(Destination::new(1, "new"), Some(link(4)));

        assert_eq!(table.len(), 1);
        let dest = &table.list_destinations()[0];
        assert_eq!(dest.name, "new");
        assert_eq!(table.resolve_transport(dest).map(|l| l.channel), Some(4));
    }

    #[test]
    fn test_link_lifecycle() {
        let table = DestinationTable::new();
        let dest = Destination::new(7, "vehicle-7");
        table.add_destination(dest.clone(), None);

        assert!(table.resolve_transport(&dest).is_none());
        assert!(table.set_link(7, link(2)));
        assert_eq!(table.resolve_transport(&dest).map(|l| l.channel), Some(2));

        assert!(table.clear_link(7).is_some());
        assert!(table.resolve_transport(&dest).is_none());
        assert_eq!(table.len(), 1);

        assert!(!table.set_link(8, link(0)));
    }

    #[test]
    fn test_remove() {
        let table = DestinationTable::new();
        table.add_destination(Destination::new(1, "a"), Some(link(0)));

        let removed = table.remove_destination(1).unwrap();
        assert_eq!(removed.id, 1);
        assert!(table.is_empty());
        assert!(table.resolve_transport(&removed).is_none());
        assert!(table.remove_destination(1).is_none());
    }
}
