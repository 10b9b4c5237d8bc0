//! Serial wire protocol: framing, inbound accumulation and status responses.
//!
//! - [`framing`] escapes payloads into `0x7E … 0x7F` frames and back.
//! - [`receiver`] turns a byte stream into raw frames with a bounded buffer.
//!
//! Commands travel as ASCII `"<id> <VERB> <args>"` payloads; the dispatcher answers
//! with a [`Response`] per state transition.
pub mod framing;
pub mod receiver;

use core::fmt::{self, Display, Formatter, Write};
use heapless::{String, Vec};

use crate::config::{MAX_FRAME_SIZE, TX_BUF_SIZE};
use crate::error::ProtocolError;

pub use receiver::FrameReceiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Processing,
    Done,
    Error,
    ErrorArgument,
    ErrorCommand,
    ErrorTransmit,
    Overflow,
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Processing => "PROCESSING",
            Status::Done => "DONE",
            Status::Error => "ERROR",
            Status::ErrorArgument => "ERROR ARGUMENT",
            Status::ErrorCommand => "ERROR COMMAND",
            Status::ErrorTransmit => "ERROR TRANSMIT",
            Status::Overflow => "OVERFLOW",
        })
    }
}

/// One status line sent back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub id: Option<u32>,
    pub status: Status,
}

impl Response {
    pub fn new(id: u32, status: Status) -> Self {
        Self {
            id: Some(id),
            status,
        }
    }

    pub fn anonymous(status: Status) -> Self {
        Self { id: None, status }
    }

    pub fn to_frame(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, ProtocolError> {
        let mut text: String<TX_BUF_SIZE> = String::new();
        write!(text, "{}", self).map_err(|_| ProtocolError::Capacity)?;
        framing::encode(text.as_bytes())
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{id}:{}", self.status),
            None => write!(f, "{}", self.status),
        }
    }
}
