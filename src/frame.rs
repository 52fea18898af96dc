//! 프레임 정의와 분할기
//!
//! - Frame: 고정 용량 와이어 단위 (`length` + `flags` + 페이로드)
//! - RtcmFramer: RTCM blob을 프레임 시퀀스로 분할, blob 단위 시퀀스 번호 관리
//!
//! 와이어 포맷:
//! ```text
//! byte[0]   : length (유효 페이로드 바이트 수, 0..=180)
//! byte[1]   : flags
//!   bit 0   : 분할 여부
//!   bit 1-2 : 조각 ID (mod 4)
//!   bit 3-7 : 시퀀스 번호 (mod 32)
//! byte[2..] : 페이로드, 나머지 용량은 0
//! ```

use std::fmt;

use bytes::Bytes;
use tracing::warn;

use crate::{
    Error, Result, FRAGMENT_ID_MODULUS, FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD, SEQUENCE_MODULUS,
    WIRE_FRAME_SIZE,
};

/// 프레임 플래그 (8비트)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// 분할 비트
    pub const FRAGMENTED: u8 = 0b0000_0001;
    const FRAGMENT_ID_SHIFT: u8 = 1;
    const FRAGMENT_ID_MASK: u8 = 0b0000_0011;
    const SEQUENCE_SHIFT: u8 = 3;
    const SEQUENCE_MASK: u8 = 0b0001_1111;

    /// 비분할 프레임 플래그
    pub fn unfragmented(sequence: u8) -> Self {
        Self((sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT)
    }

    /// 분할 프레임 플래그. `index`는 blob 내 프레임 순번이며 mod 4로 기록됨
    pub fn fragment(index: usize, sequence: u8) -> Self {
        let fragment_id = (index % FRAGMENT_ID_MODULUS as usize) as u8;
        Self(
            Self::FRAGMENTED
                | (fragment_id << Self::FRAGMENT_ID_SHIFT)
                | ((sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT),
        )
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_fragmented(self) -> bool {
        self.0 & Self::FRAGMENTED != 0
    }

    /// 조각 ID (분할 프레임에서만 의미 있음)
    pub fn fragment_id(self) -> u8 {
        (self.0 >> Self::FRAGMENT_ID_SHIFT) & Self::FRAGMENT_ID_MASK
    }

    pub fn sequence_id(self) -> u8 {
        (self.0 >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
    }
}

impl fmt::Debug for FrameFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fragmented() {
            write!(
                f,
                "FLAGS{{0x{:02X} seq={} frag={}}}",
                self.0,
                self.sequence_id(),
                self.fragment_id()
            )
        } else {
            write!(f, "FLAGS{{0x{:02X} seq={}}}", self.0, self.sequence_id())
        }
    }
}

/// 프레임 (송신 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    flags: FrameFlags,
    data: Bytes,
}

impl Frame {
    /// 새 프레임 생성. 페이로드가 용량을 넘으면 에러
    pub fn new(flags: FrameFlags, data: Bytes) -> Result<Self> {
        if data.len() > MAX_FRAME_PAYLOAD {
            return Err(Error::InvalidFrame {
                length: data.len(),
                capacity: MAX_FRAME_PAYLOAD,
            });
        }
        Ok(Self { flags, data })
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// 유효 페이로드 길이
    pub fn length(&self) -> u8 {
        self.data.len() as u8
    }

    pub fn payload(&self) -> &Bytes {
        &self.data
    }

    /// 프레임을 와이어 바이트로 직렬화 (항상 `WIRE_FRAME_SIZE` 바이트)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; WIRE_FRAME_SIZE];
        buf[0] = self.length();
        buf[1] = self.flags.bits();
        buf[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + self.data.len()].copy_from_slice(&self.data);
        buf
    }

    /// 와이어 바이트에서 프레임 파싱
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return None;
        }

        let length = bytes[0] as usize;
        if length > MAX_FRAME_PAYLOAD || bytes.len() < FRAME_HEADER_SIZE + length {
            return None;
        }

        Some(Self {
            flags: FrameFlags::from_bits(bytes[1]),
            data: Bytes::copy_from_slice(&bytes[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + length]),
        })
    }
}

/// RTCM blob 분할기 (송신측)
///
/// 시퀀스 카운터는 분할기 인스턴스가 단독 소유하며 blob 하나당 정확히 1 증가한다.
#[derive(Debug)]
pub struct RtcmFramer {
    capacity: usize,
    sequence: u8,
}

impl RtcmFramer {
    /// 최대 용량 분할기
    pub fn new() -> Self {
        Self {
            capacity: MAX_FRAME_PAYLOAD,
            sequence: 0,
        }
    }

    /// 용량 지정 분할기 (1..=`MAX_FRAME_PAYLOAD`)
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_FRAME_PAYLOAD {
            return Err(Error::InvalidConfig(format!(
                "frame capacity must be 1..={}, got {}",
                MAX_FRAME_PAYLOAD, capacity
            )));
        }
        Ok(Self {
            capacity,
            sequence: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 다음 blob에 붙을 시퀀스 번호
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// 시퀀스 카운터 초기화
    pub fn reset(&mut self) {
        self.sequence = 0;
    }

    /// blob을 프레임들로 분할
    ///
    /// 용량 미만이면 비분할 프레임 1개, 이상이면 `ceil(len / capacity)`개의 분할 프레임을
    /// 오프셋 순서대로 반환한다. 빈 blob은 길이 0 프레임 1개가 된다.
    pub fn frame(&mut self, blob: &Bytes) -> Vec<Frame> {
        let sequence = self.sequence;

        let frames = if blob.len() < self.capacity {
            vec![Frame {
                flags: FrameFlags::unfragmented(sequence),
                data: blob.clone(),
            }]
        } else {
            let total_frames = (blob.len() + self.capacity - 1) / self.capacity;
            if total_frames > FRAGMENT_ID_MODULUS as usize {
                warn!(
                    "blob {} bytes -> {} 조각: 조각 ID가 순환함 (seq={})",
                    blob.len(),
                    total_frames,
                    sequence
                );
            }

            (0..total_frames)
                .map(|idx| {
                    let start = idx * self.capacity;
                    let end = (start + self.capacity).min(blob.len());
                    Frame {
                        flags: FrameFlags::fragment(idx, sequence),
                        data: blob.slice(start..end),
                    }
                })
                .collect()
        };

        self.sequence = (self.sequence + 1) % SEQUENCE_MODULUS;
        frames
    }
}

impl Default for RtcmFramer {
    fn default() -> Self {
        Self::new()
    }
}
