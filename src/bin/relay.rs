//! RTCM Relay - UDP로 들어오는 RTCM 보정 데이터를 MAVLink 목적지들로 중계
//!
//! datagram 하나를 blob 하나로 보고 `GPS_RTCM_DATA` 프레임으로 분할해 전송
//!
//! 사용법:
//!   cargo run --release --bin rtcm-relay -- [OPTIONS]
//!
//! 예시:
//!   # 로컬 NTRIP 클라이언트 출력을 두 기체로 중계
//!   cargo run --release --bin rtcm-relay -- --listen 0.0.0.0:2101 -t 192.168.1.10:14550 -t 192.168.1.11:14550
//!
//!   # raw 프레임 + 링크 스레드 사용
//!   cargo run --release --bin rtcm-relay -- -t 127.0.0.1:14550 --raw --queued

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{info, trace, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rtcm_relay::{
    Config, Destination, DestinationTable, Link, QueuedTransport, RtcmRelay, Transport,
    UdpTransport, WireEncoding,
};

/// 목적지 ID는 1부터, 채널은 0부터 붙이므로 최대 254개
const MAX_TARGETS: usize = u8::MAX as usize - 1;

/// `idx`번째 목적지의 (목적지 ID, 채널)
fn target_ids(idx: usize) -> Result<(u8, u8), String> {
    if idx >= MAX_TARGETS {
        return Err(format!("목적지는 최대 {}개까지 지정 가능", MAX_TARGETS));
    }
    let channel = u8::try_from(idx).map_err(|e| e.to_string())?;
    Ok((channel + 1, channel))
}

/// 실행 인자
struct RelayArgs {
    listen_addr: SocketAddr,
    targets: Vec<SocketAddr>,
    encoding: WireEncoding,
    queued: bool,
    verbose: bool,
    config: Config,
}

impl Default for RelayArgs {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 2101)),
            targets: Vec::new(),
            encoding: WireEncoding::Mavlink2,
            queued: false,
            verbose: false,
            config: Config::default(),
        }
    }
}

fn parse_args() -> RelayArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = RelayArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--listen" | "-l" => {
                if i + 1 < args.len() {
                    parsed.listen_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--target" | "-t" => {
                if i + 1 < args.len() {
                    parsed.targets.push(args[i + 1].parse().expect("유효한 주소 필요"));
                    i += 1;
                }
            }
            "--system-id" => {
                if i + 1 < args.len() {
                    parsed.config.system_id = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--component-id" => {
                if i + 1 < args.len() {
                    parsed.config.component_id = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--window-ms" => {
                if i + 1 < args.len() {
                    parsed.config.bandwidth_window_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--raw" => {
                parsed.encoding = WireEncoding::Raw;
            }
            "--queued" | "-q" => {
                parsed.queued = true;
            }
            "--verbose" | "-v" => {
                parsed.verbose = true;
                parsed.config.log_payload = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"RTCM Relay - RTCM 보정 데이터 중계기

UDP로 받은 RTCM blob을 180바이트 프레임으로 분할해 모든 목적지로 전송
- 용량 미만 blob은 단일 프레임, 이상은 분할 플래그 + 조각 ID
- blob마다 5비트 시퀀스 번호
- 1초 단위 입력 대역폭 보고

사용법:
  cargo run --release --bin rtcm-relay -- [OPTIONS]

옵션:
  -l, --listen <ADDR>     RTCM 수신 주소 (기본: 0.0.0.0:2101)
  -t, --target <ADDR>     목적지 주소 (여러 번 지정 가능)
  --system-id <ID>        MAVLink 시스템 ID (기본: 255)
  --component-id <ID>     MAVLink 컴포넌트 ID (기본: 190)
  --window-ms <MS>        대역폭 샘플링 윈도우 (기본: 1000)
  --raw                   MAVLink 대신 raw 프레임 전송
  -q, --queued            목적지별 링크 스레드 사용
  -v, --verbose           DEBUG 로그 + 페이로드 덤프
  -h, --help              이 도움말 출력

RUST_LOG 환경 변수가 있으면 로그 레벨보다 우선
"#
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("알 수 없는 옵션: {}", other);
            }
        }
        i += 1;
    }

    parsed
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    // 로깅 설정 (RUST_LOG 우선)
    let default_level = if args.verbose { "trace" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.config.clone();
    config.validate()?;
    if args.targets.len() > MAX_TARGETS {
        return Err(format!(
            "목적지 {}개 지정됨, 최대 {}개",
            args.targets.len(),
            MAX_TARGETS
        )
        .into());
    }

    info!("RTCM Relay starting...");
    info!("Listen address: {}", args.listen_addr);
    info!("Encoding: {:?}", args.encoding);
    info!("Source: {}/{}", config.system_id, config.component_id);

    // 목적지 구성
    let table = Arc::new(DestinationTable::new());
    for (idx, target) in args.targets.iter().enumerate() {
        let local_addr: SocketAddr = if target.is_ipv4() {
            "0.0.0.0:0".parse()?
        } else {
            "[::]:0".parse()?
        };

        let udp: Arc<dyn Transport> =
            Arc::new(UdpTransport::connect(local_addr, *target, args.encoding).await?);
        let transport: Arc<dyn Transport> = if args.queued {
            Arc::new(QueuedTransport::from_config(udp, &config)?)
        } else {
            udp
        };

        let (id, channel) = target_ids(idx)?;
        table.add_destination(
            Destination::new(id, target.to_string()),
            Some(Link::new(channel, transport)),
        );
        info!("Target {}: {}", id, target);
    }

    if table.is_empty() {
        warn!("목적지 없음 - 대역폭만 측정");
    }

    // 대역폭 보고
    let (rate_tx, mut rate_rx) = watch::channel(0u64);
    let _rate_task = tokio::spawn(async move {
        while rate_rx.changed().await.is_ok() {
            let rate = *rate_rx.borrow();
            info!("RTCM data rate: {} B/s ({:.2} kB/s)", rate, rate as f64 / 1024.0);
        }
    });

    let relay = RtcmRelay::new(config, table, Arc::new(rate_tx))?;

    // ─────────────────────────────────────────────────────────────────
    // 수신 루프
    // ─────────────────────────────────────────────────────────────────
    let socket = UdpSocket::bind(args.listen_addr).await?;
    info!("Waiting for RTCM data on {}", socket.local_addr()?);

    let mut buf = vec![0u8; 65535];
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, addr)) => {
                        trace!("RTCM {} bytes from {}", len, addr);
                        relay.rtcm_data_update(Bytes::copy_from_slice(&buf[..len]));
                    }
                    Err(e) => {
                        warn!("수신 에러: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    info!("{}", relay.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ids() {
        assert_eq!(target_ids(0), Ok((1, 0)));
        assert_eq!(target_ids(253), Ok((254, 253)));
    }

    #[test]
    fn test_target_ids_reject_overflow() {
        // 255번째 목적지부터는 ID가 u8을 넘거나 앞 목적지와 겹침
        assert!(target_ids(254).is_err());
        assert!(target_ids(255).is_err());
        assert!(target_ids(300).is_err());
    }
}
