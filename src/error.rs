//! Error taxonomy shared by the solver, planner, protocol and store.
use core::fmt::{self, Display, Formatter};

/// A command argument the arm cannot honour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidArgument {
    Duty(u16),
    Channel(usize),
    Width(f32),
    OutOfWorkspace,
    /// A joint angle landed outside `[0, 90]` after calibration scaling.
    JointRange { joint: usize, angle: f32 },
    Timing { full_ms: u32, balance_ms: u32 },
    /// Capturing this limit would leave `lower >= upper`.
    Limit { channel: usize, duty: u16 },
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    TooShort,
    BadDelimiter,
    UnescapedMarker,
    DanglingEscape,
    Capacity,
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Io,
    Corrupt,
    Capacity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmError {
    InvalidArgument(InvalidArgument),
    Protocol(ProtocolError),
    Storage(StorageError),
    ActuatorFault { channel: usize },
}

impl Display for InvalidArgument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InvalidArgument::Duty(duty) => write!(f, "duty {duty} us out of range"),
            InvalidArgument::Channel(channel) => write!(f, "channel {channel} not available"),
            InvalidArgument::Width(width) => write!(f, "gripper width {width} cm out of range"),
            InvalidArgument::OutOfWorkspace => f.write_str("target outside the workspace"),
            InvalidArgument::JointRange { joint, angle } => {
                write!(f, "joint {joint} angle {angle} out of range [0 90]")
            }
            InvalidArgument::Timing {
                full_ms,
                balance_ms,
            } => write!(f, "timing {full_ms} ms / {balance_ms} ms rejected"),
            InvalidArgument::Limit { channel, duty } => {
                write!(f, "limit {duty} us would invert channel {channel}")
            }
            InvalidArgument::Malformed => f.write_str("malformed arguments"),
        }
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::TooShort => f.write_str("frame too short"),
            ProtocolError::BadDelimiter => f.write_str("frame not delimited"),
            ProtocolError::UnescapedMarker => f.write_str("unescaped marker in frame body"),
            ProtocolError::DanglingEscape => f.write_str("escape byte at end of body"),
            ProtocolError::Capacity => f.write_str("frame exceeds buffer"),
            ProtocolError::Overflow => f.write_str("receive buffer overflow"),
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => f.write_str("record not found"),
            StorageError::Io => f.write_str("storage access failed"),
            StorageError::Corrupt => f.write_str("record corrupt"),
            StorageError::Capacity => f.write_str("record too large"),
        }
    }
}

impl Display for ArmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ArmError::InvalidArgument(e) => write!(f, "invalid argument: {e}"),
            ArmError::Protocol(e) => write!(f, "protocol error: {e}"),
            ArmError::Storage(e) => write!(f, "storage error: {e}"),
            ArmError::ActuatorFault { channel } => write!(f, "actuator fault on channel {channel}"),
        }
    }
}

impl From<InvalidArgument> for ArmError {
    fn from(value: InvalidArgument) -> Self {
        ArmError::InvalidArgument(value)
    }
}

impl From<ProtocolError> for ArmError {
    fn from(value: ProtocolError) -> Self {
        ArmError::Protocol(value)
    }
}

impl From<StorageError> for ArmError {
    fn from(value: StorageError) -> Self {
        ArmError::Storage(value)
    }
}
