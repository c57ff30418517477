//! Wire frames and their encoding.
//!
//! The radio carries short payloads (at most [`MAX_FRAME_LEN`] bytes). Most
//! frames are bare ASCII keywords matched exactly; numeric payloads (clock
//! values, slot boundaries, readings) are 8-byte little-endian values with no
//! field tag. A bare value is meaningful only through the receiver's
//! positional state (awaiting a clock reference, a slot start, a slot
//! duration, or a forwarded reading) — see [`crate::slots::RxState`] and the
//! border's collection state machine.
//!
//! Anything that is neither a keyword nor an 8-byte value decodes as
//! [`Frame::Raw`]; the only raw frame the protocol itself produces is the
//! tagged child address a coordinator announces before forwarding readings.

use alloc::vec::Vec;

use crate::types::{NodeAddr, MAX_FRAME_LEN};

/// Decoding error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Zero-length payload.
    Empty,
    /// Payload exceeds [`MAX_FRAME_LEN`].
    TooLong,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "empty frame"),
            DecodeError::TooLong => write!(f, "frame exceeds maximum length"),
        }
    }
}

/// A single radio frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Discovery probe broadcast by a booting node.
    New,
    /// Coordinator advertisement (discovery response or promotion announce).
    Coordinator,
    /// Sensor advertisement, or the forwarded-reading announcement tag.
    Sensor,
    /// Join request sent to a selected parent.
    Child,
    /// Join acceptance.
    Parent,
    /// Join rejection (parent at capacity).
    No,
    /// Root asks a coordinator for its adjusted clock.
    ClockRequest,
    /// Marker preceding the slot_start / slot_duration value pair.
    Window,
    /// Liveness signal from a coordinator with no children.
    Ping,
    /// Poll request to a child.
    Poll,
    /// Terminator a polled child sends after its readings.
    Done,
    /// Graceful shutdown of the border loop.
    Stop,
    /// Untyped numeric payload; meaning is positional.
    Value(u64),
    /// Any other payload, forwarded or interpreted positionally.
    Raw(Vec<u8>),
}

/// Leading byte of an address frame. Keywords all start with an ASCII
/// letter and value frames are 8 bytes wide, so a 3-byte frame starting
/// with this tag cannot be mistaken for either.
const ADDR_TAG: u8 = 0x00;

const KEYWORDS: &[(&[u8], Frame)] = &[
    (b"new", Frame::New),
    (b"coordinator", Frame::Coordinator),
    (b"sensor", Frame::Sensor),
    (b"child", Frame::Child),
    (b"parent", Frame::Parent),
    (b"no", Frame::No),
    (b"clock_request", Frame::ClockRequest),
    (b"window", Frame::Window),
    (b"ping", Frame::Ping),
    (b"poll", Frame::Poll),
    (b"done", Frame::Done),
    (b"stop", Frame::Stop),
];

impl Frame {
    /// Encode the frame to its wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Value(v) => v.to_le_bytes().to_vec(),
            Frame::Raw(bytes) => bytes.clone(),
            other => {
                for (bytes, frame) in KEYWORDS {
                    if frame == other {
                        return bytes.to_vec();
                    }
                }
                // All non-payload variants appear in KEYWORDS.
                Vec::new()
            }
        }
    }

    /// Decode a payload into a frame.
    ///
    /// Keywords are matched exactly; an 8-byte payload that is not a keyword
    /// is a [`Frame::Value`]; everything else within the length limit is
    /// [`Frame::Raw`].
    pub fn decode(payload: &[u8]) -> Result<Frame, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        if payload.len() > MAX_FRAME_LEN {
            return Err(DecodeError::TooLong);
        }

        for (bytes, frame) in KEYWORDS {
            if *bytes == payload {
                return Ok(frame.clone());
            }
        }

        if payload.len() == 8 {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(payload);
            return Ok(Frame::Value(u64::from_le_bytes(buf)));
        }

        Ok(Frame::Raw(payload.to_vec()))
    }

    /// Frame carrying a node address (the forwarded-reading attribution).
    ///
    /// The tag byte keeps an address whose bytes happen to spell a keyword
    /// (such as `[b'n', b'o']`) from decoding as that keyword.
    pub fn addr(addr: NodeAddr) -> Frame {
        let mut bytes = Vec::with_capacity(3);
        bytes.push(ADDR_TAG);
        bytes.extend_from_slice(&addr);
        Frame::Raw(bytes)
    }

    /// Interpret a raw frame as a node address, if it is tagged as one.
    pub fn as_addr(&self) -> Option<NodeAddr> {
        match self {
            Frame::Raw(bytes) if bytes.len() == 3 && bytes[0] == ADDR_TAG => {
                Some([bytes[1], bytes[2]])
            }
            _ => None,
        }
    }

    /// Interpret the frame as a bare numeric payload.
    pub fn as_value(&self) -> Option<u64> {
        match self {
            Frame::Value(v) => Some(*v),
            _ => None,
        }
    }
}
