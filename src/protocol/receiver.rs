//! Byte-at-a-time accumulator for inbound frames.
use heapless::{Deque, Vec};

use crate::config::{PENDING_FRAMES, RX_BUF_SIZE};
use crate::error::ProtocolError;
use crate::protocol::framing::{END_BYTE, START_BYTE};

pub type RawFrame = Vec<u8, RX_BUF_SIZE>;

/// Collects serial bytes until an end marker completes a raw frame.
///
/// A [`START_BYTE`] always opens a new frame, dropping any partial one. Bytes seen
/// outside a frame, including the tail of an overflowed one, are ignored. Frames
/// are not validated here; everything from a start marker up to and including an
/// [`END_BYTE`] is handed to [`decode`](crate::protocol::framing::decode).
pub struct FrameReceiver {
    buf: RawFrame,
    ready: Deque<RawFrame, PENDING_FRAMES>,
}

impl FrameReceiver {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            ready: Deque::new(),
        }
    }

    /// Pushes one byte. Returns `Err(Overflow)` when the buffered bytes had to be
    /// discarded.
    pub fn push(&mut self, byte: u8) -> Result<(), ProtocolError> {
        if byte == START_BYTE {
            self.buf.clear();
        } else if self.buf.is_empty() {
            return Ok(());
        }
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            return Err(ProtocolError::Overflow);
        }
        if byte == END_BYTE {
            let frame = core::mem::take(&mut self.buf);
            if self.ready.push_back(frame).is_err() {
                return Err(ProtocolError::Overflow);
            }
        }
        Ok(())
    }

    /// Oldest complete frame, if any.
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        self.ready.pop_front()
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::framing::encode;

    #[test]
    fn splits_stream_into_frames() {
        let mut rx = FrameReceiver::new();
        let first: Vec<u8, 32> = encode(b"1 SAVE").unwrap();
        let second: Vec<u8, 32> = encode(b"2 SETHOME").unwrap();
        for &b in first.iter().chain(second.iter()) {
            rx.push(b).unwrap();
        }
        assert_eq!(rx.next_frame().unwrap().as_slice(), first.as_slice());
        assert_eq!(rx.next_frame().unwrap().as_slice(), second.as_slice());
        assert!(rx.next_frame().is_none());
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn overflow_discards_buffered_bytes() {
        let mut rx = FrameReceiver::new();
        rx.push(START_BYTE).unwrap();
        for _ in 1..RX_BUF_SIZE {
            rx.push(b'a').unwrap();
        }
        assert_eq!(rx.push(b'a'), Err(ProtocolError::Overflow));
        assert_eq!(rx.buffered(), 0);

        // The link keeps working afterwards.
        let frame: Vec<u8, 16> = encode(b"3 SAVE").unwrap();
        for &b in frame.iter() {
            rx.push(b).unwrap();
        }
        assert_eq!(rx.next_frame().unwrap().as_slice(), frame.as_slice());
    }

    #[test]
    fn start_byte_resynchronizes() {
        let mut rx = FrameReceiver::new();
        let frame: Vec<u8, 16> = encode(b"4 SAVE").unwrap();

        // Line noise before a frame and a truncated frame are both dropped.
        for &b in b"\r\n".iter().chain(&[START_BYTE, b'9', b' ']) {
            rx.push(b).unwrap();
        }
        for &b in frame.iter() {
            rx.push(b).unwrap();
        }
        assert_eq!(rx.next_frame().unwrap().as_slice(), frame.as_slice());
        assert!(rx.next_frame().is_none());
    }

    #[test]
    fn overflowed_tail_is_ignored() {
        let mut rx = FrameReceiver::new();
        rx.push(START_BYTE).unwrap();
        let overflow = (0..RX_BUF_SIZE).find_map(|_| rx.push(b'a').err());
        assert_eq!(overflow, Some(ProtocolError::Overflow));

        for &b in b"tail".iter().chain(&[END_BYTE]) {
            rx.push(b).unwrap();
        }
        assert!(rx.next_frame().is_none());
        assert_eq!(rx.buffered(), 0);
    }
}
