//! 전송 계층
//!
//! - Transport: 링크 하나에 프레임을 보내는 송신 primitive
//! - UdpTransport: tokio UDP 소켓 기반 (MAVLink v2 또는 raw 프레임)
//! - QueuedTransport: 링크 소유 스레드로 프레임을 넘기는 래퍼 (대기 시간 상한)

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, TrySendError};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::frame::Frame;
use crate::mavlink::encode_gps_rtcm_data;
use crate::{Config, Error, Result};

/// 송신자 식별자 (MAVLink system/component)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub system_id: u8,
    pub component_id: u8,
}

impl SourceId {
    pub fn from_config(config: &Config) -> Self {
        Self {
            system_id: config.system_id,
            component_id: config.component_id,
        }
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 프레임 송신 primitive
///
/// 어느 스레드에서 호출해도 안전해야 하며, 실패는 반환값으로만 알린다.
pub trait Transport: Send + Sync {
    /// `routing_id`는 목적지 링크의 채널 번호
    fn send(&self, frame: &Frame, source: SourceId, routing_id: u8) -> Result<()>;
}

/// UDP 페이로드 인코딩
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireEncoding {
    /// MAVLink v2 `GPS_RTCM_DATA`
    #[default]
    Mavlink2,

    /// `[length, flags, payload]` 고정 크기 프레임
    Raw,
}

/// UDP 링크
pub struct UdpTransport {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    encoding: WireEncoding,
    /// 채널별 MAVLink 패킷 시퀀스
    packet_sequences: Mutex<[u8; 256]>,
}

impl UdpTransport {
    /// 로컬 주소에 바인딩 후 원격 주소로 connect
    pub async fn connect(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        encoding: WireEncoding,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(remote_addr).await?;
        // try_send 전에 쓰기 준비 상태를 받아 둠
        socket.writable().await?;

        debug!("UDP link {} -> {} ({:?})", socket.local_addr()?, remote_addr, encoding);

        Ok(Self {
            socket,
            remote_addr,
            encoding,
            packet_sequences: Mutex::new([0u8; 256]),
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn encoding(&self) -> WireEncoding {
        self.encoding
    }

    fn next_packet_sequence(&self, channel: u8) -> u8 {
        let mut sequences = self.packet_sequences.lock();
        let seq = sequences[channel as usize];
        sequences[channel as usize] = seq.wrapping_add(1);
        seq
    }
}

impl Transport for UdpTransport {
    fn send(&self, frame: &Frame, source: SourceId, routing_id: u8) -> Result<()> {
        let sent = match self.encoding {
            WireEncoding::Mavlink2 => {
                let seq = self.next_packet_sequence(routing_id);
                let packet = encode_gps_rtcm_data(frame, source, seq);
                self.socket.try_send(&packet)?
            }
            WireEncoding::Raw => self.socket.try_send(&frame.to_bytes())?,
        };

        trace!(
            "UDP {} 바이트 전송 -> {} (channel={}, {:?})",
            sent,
            self.remote_addr,
            routing_id,
            frame.flags()
        );
        Ok(())
    }
}

/// 링크 스레드 명령
enum LinkCommand {
    Send {
        frame: Frame,
        source: SourceId,
        routing_id: u8,
    },
    Stop,
}

/// 링크 소유 스레드로 프레임을 넘기는 전송
///
/// 호출 스레드는 큐에 넣는 동안만 대기하며, 최대 `handoff_timeout` 후 실패한다.
/// 실제 송신 실패는 링크 스레드에서 로그로만 남는다.
pub struct QueuedTransport {
    tx: crossbeam_channel::Sender<LinkCommand>,
    handoff_timeout: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueuedTransport {
    /// 링크 스레드 시작
    pub fn spawn(
        inner: Arc<dyn Transport>,
        queue_capacity: usize,
        handoff_timeout: Duration,
    ) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded::<LinkCommand>(queue_capacity);

        let worker = std::thread::Builder::new()
            .name("rtcm-link".to_string())
            .spawn(move || {
                for cmd in rx {
                    match cmd {
                        LinkCommand::Send {
                            frame,
                            source,
                            routing_id,
                        } => {
                            if let Err(e) = inner.send(&frame, source, routing_id) {
                                warn!("링크 스레드 송신 실패 (channel={}): {}", routing_id, e);
                            }
                        }
                        LinkCommand::Stop => break,
                    }
                }
                debug!("링크 스레드 종료");
            })?;

        Ok(Self {
            tx,
            handoff_timeout,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// 설정값으로 링크 스레드 시작
    pub fn from_config(inner: Arc<dyn Transport>, config: &Config) -> Result<Self> {
        Self::spawn(inner, config.link_queue_capacity, config.handoff_timeout())
    }

    /// 링크 스레드 정지 (큐에 남은 프레임은 처리 후 종료)
    pub fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(TrySendError::Full(cmd)) = self.tx.try_send(LinkCommand::Stop) {
                let _ = self.tx.send(cmd);
            }
            if worker.join().is_err() {
                warn!("링크 스레드 panic");
            }
        }
    }
}

impl Transport for QueuedTransport {
    fn send(&self, frame: &Frame, source: SourceId, routing_id: u8) -> Result<()> {
        let cmd = LinkCommand::Send {
            frame: frame.clone(),
            source,
            routing_id,
        };

        self.tx
            .send_timeout(cmd, self.handoff_timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => Error::HandoffTimeout {
                    timeout_ms: self.handoff_timeout.as_millis() as u64,
                },
                SendTimeoutError::Disconnected(_) => Error::ConnectionClosed,
            })
    }
}

impl Drop for QueuedTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
