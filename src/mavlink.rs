//! MAVLink v2 `GPS_RTCM_DATA` (#233) 캡슐화
//!
//! ```text
//! ┌─────┬─────┬────────┬────────┬─────┬───────┬────────┬─────────┬─────────┬───────┐
//! │ STX │ LEN │ INCOMP │ COMPAT │ SEQ │ SYSID │ COMPID │ MSGID   │ PAYLOAD │ CRC   │
//! │ FD  │ 1B  │ 1B     │ 1B     │ 1B  │ 1B    │ 1B     │ 3B LE   │ ≤182B   │ 2B LE │
//! └─────┴─────┴────────┴────────┴─────┴───────┴────────┴─────────┴─────────┴───────┘
//! ```
//!
//! 페이로드는 `[flags, len, data[180]]` 순서이며 뒤쪽 0 바이트는 잘려 나간다 (최소 1바이트).

use bytes::{BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_16_MCRF4XX};

use crate::frame::{Frame, FrameFlags};
use crate::transport::SourceId;
use crate::{Error, Result, MAX_FRAME_PAYLOAD};

/// MAVLink v2 시작 바이트
pub const MAVLINK_V2_STX: u8 = 0xFD;

/// `GPS_RTCM_DATA` 메시지 ID
pub const GPS_RTCM_DATA_ID: u32 = 233;

/// `GPS_RTCM_DATA` CRC extra
pub const GPS_RTCM_DATA_CRC_EXTRA: u8 = 35;

/// 잘리지 않은 페이로드 길이
pub const GPS_RTCM_DATA_LEN: usize = 2 + MAX_FRAME_PAYLOAD;

const HEADER_LEN: usize = 10;
const CHECKSUM_LEN: usize = 2;

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// 디코딩된 패킷 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MavlinkHeader {
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u32,
}

fn checksum(header_and_payload: &[u8]) -> u16 {
    let mut digest = X25.digest();
    digest.update(header_and_payload);
    digest.update(&[GPS_RTCM_DATA_CRC_EXTRA]);
    digest.finalize()
}

/// 프레임을 `GPS_RTCM_DATA` 패킷으로 인코딩
pub fn encode_gps_rtcm_data(frame: &Frame, source: SourceId, sequence: u8) -> Bytes {
    let mut payload = [0u8; GPS_RTCM_DATA_LEN];
    payload[0] = frame.flags().bits();
    payload[1] = frame.length();
    payload[2..2 + frame.payload().len()].copy_from_slice(frame.payload());

    let mut payload_len = GPS_RTCM_DATA_LEN;
    while payload_len > 1 && payload[payload_len - 1] == 0 {
        payload_len -= 1;
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload_len + CHECKSUM_LEN);
    buf.put_u8(MAVLINK_V2_STX);
    buf.put_u8(payload_len as u8);
    buf.put_u8(0); // incompat flags
    buf.put_u8(0); // compat flags
    buf.put_u8(sequence);
    buf.put_u8(source.system_id);
    buf.put_u8(source.component_id);
    buf.put_slice(&GPS_RTCM_DATA_ID.to_le_bytes()[..3]);
    buf.put_slice(&payload[..payload_len]);

    let crc = checksum(&buf[1..]);
    buf.put_u16_le(crc);
    buf.freeze()
}

/// `GPS_RTCM_DATA` 패킷 디코딩
pub fn decode_gps_rtcm_data(bytes: &[u8]) -> Result<(MavlinkHeader, Frame)> {
    if bytes.len() < HEADER_LEN + 1 + CHECKSUM_LEN {
        return Err(Error::Mavlink(format!("packet too short: {} bytes", bytes.len())));
    }
    if bytes[0] != MAVLINK_V2_STX {
        return Err(Error::Mavlink(format!("unexpected start byte 0x{:02X}", bytes[0])));
    }
    if bytes[2] != 0 {
        return Err(Error::Mavlink(format!(
            "unsupported incompat flags 0x{:02X}",
            bytes[2]
        )));
    }

    let payload_len = bytes[1] as usize;
    if payload_len == 0 || payload_len > GPS_RTCM_DATA_LEN {
        return Err(Error::Mavlink(format!("invalid payload length {}", payload_len)));
    }
    let packet_len = HEADER_LEN + payload_len + CHECKSUM_LEN;
    if bytes.len() < packet_len {
        return Err(Error::Mavlink(format!(
            "truncated packet: need {} bytes, got {}",
            packet_len,
            bytes.len()
        )));
    }

    let message_id = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], 0]);
    if message_id != GPS_RTCM_DATA_ID {
        return Err(Error::Mavlink(format!("unexpected message id {}", message_id)));
    }

    let crc_offset = HEADER_LEN + payload_len;
    let expected = checksum(&bytes[1..crc_offset]);
    let got = u16::from_le_bytes([bytes[crc_offset], bytes[crc_offset + 1]]);
    if expected != got {
        return Err(Error::ChecksumMismatch { expected, got });
    }

    let mut payload = [0u8; GPS_RTCM_DATA_LEN];
    payload[..payload_len].copy_from_slice(&bytes[HEADER_LEN..crc_offset]);

    let length = payload[1] as usize;
    if length > MAX_FRAME_PAYLOAD {
        return Err(Error::InvalidFrame {
            length,
            capacity: MAX_FRAME_PAYLOAD,
        });
    }
    let frame = Frame::new(
        FrameFlags::from_bits(payload[0]),
        Bytes::copy_from_slice(&payload[2..2 + length]),
    )?;

    let header = MavlinkHeader {
        sequence: bytes[4],
        system_id: bytes[5],
        component_id: bytes[6],
        message_id,
    };
    Ok((header, frame))
}
