//! Byte-stuffed framing for the serial link.
//!
//! A frame is `START, body, END`. Any payload byte equal to one of the three marker
//! bytes is sent as `ESCAPE, byte ^ ESCAPE_XOR`, so markers never appear raw inside
//! the body.
use heapless::Vec;

use crate::error::ProtocolError;

pub const START_BYTE: u8 = 0x7E;
pub const END_BYTE: u8 = 0x7F;
pub const ESCAPE_BYTE: u8 = 0x7D;
pub const ESCAPE_XOR: u8 = 0x20;

fn is_marker(byte: u8) -> bool {
    matches!(byte, START_BYTE | END_BYTE | ESCAPE_BYTE)
}

/// Wraps `payload` into a frame.
pub fn encode<const N: usize>(payload: &[u8]) -> Result<Vec<u8, N>, ProtocolError> {
    let mut frame = Vec::new();
    frame.push(START_BYTE).map_err(|_| ProtocolError::Capacity)?;
    for &byte in payload {
        if is_marker(byte) {
            frame
                .extend_from_slice(&[ESCAPE_BYTE, byte ^ ESCAPE_XOR])
                .map_err(|_| ProtocolError::Capacity)?;
        } else {
            frame.push(byte).map_err(|_| ProtocolError::Capacity)?;
        }
    }
    frame.push(END_BYTE).map_err(|_| ProtocolError::Capacity)?;
    Ok(frame)
}

/// Unwraps one complete frame back into its payload.
pub fn decode<const N: usize>(frame: &[u8]) -> Result<Vec<u8, N>, ProtocolError> {
    if frame.len() < 3 {
        return Err(ProtocolError::TooShort);
    }
    if frame[0] != START_BYTE || frame[frame.len() - 1] != END_BYTE {
        return Err(ProtocolError::BadDelimiter);
    }

    let mut payload = Vec::new();
    let mut body = frame[1..frame.len() - 1].iter();
    while let Some(&byte) = body.next() {
        let byte = match byte {
            START_BYTE | END_BYTE => return Err(ProtocolError::UnescapedMarker),
            ESCAPE_BYTE => body.next().ok_or(ProtocolError::DanglingEscape)? ^ ESCAPE_XOR,
            _ => byte,
        };
        payload.push(byte).map_err(|_| ProtocolError::Capacity)?;
    }
    Ok(payload)
}
