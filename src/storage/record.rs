//! Fixed little-endian image of a [`ServoHandle`].
//!
//! ```text
//! marker u32
//! 6 x (current u16, target u16)
//! 5 x (scale f32, bias f32, lower u16, upper u16)
//! time_full u16, time_balance u16
//! gripper_length f32
//! ```
use crate::config::{
    CHANNEL_COUNT, CONTROL_INTERVAL_MS, JOINT_COUNT, MAX_MOVE_MS, MAX_PULSEWIDTH, MIN_MOVE_MS,
    MIN_PULSEWIDTH, RECORD_MARKER,
};
use crate::error::StorageError;
use crate::robot::calibration::Calibration;
use crate::robot::channel::Channel;
use crate::robot::state::ServoHandle;

pub const RECORD_LEN: usize = 4 + CHANNEL_COUNT * 4 + JOINT_COUNT * 12 + 4 + 4;

pub type Record = [u8; RECORD_LEN];

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> Result<f32, StorageError> {
        let value = f32::from_le_bytes(self.take());
        value.is_finite().then_some(value).ok_or(StorageError::Corrupt)
    }
}

pub fn encode(handle: &ServoHandle) -> Record {
    let mut image = [0; RECORD_LEN];
    let mut w = Writer {
        buf: &mut image,
        pos: 0,
    };

    w.put(&handle.marker.to_le_bytes());
    for ch in &handle.channels {
        w.put(&ch.current().to_le_bytes());
        w.put(&ch.target().to_le_bytes());
    }
    for cal in &handle.calibration {
        w.put(&cal.scale.to_le_bytes());
        w.put(&cal.bias.to_le_bytes());
        w.put(&cal.lower_limit.to_le_bytes());
        w.put(&cal.upper_limit.to_le_bytes());
    }
    w.put(&handle.time_full.to_le_bytes());
    w.put(&handle.time_balance.to_le_bytes());
    w.put(&handle.gripper_length.to_le_bytes());
    image
}

fn check(ok: bool) -> Result<(), StorageError> {
    ok.then_some(()).ok_or(StorageError::Corrupt)
}

fn duty(r: &mut Reader<'_>) -> Result<u16, StorageError> {
    let duty = r.u16();
    check((MIN_PULSEWIDTH..=MAX_PULSEWIDTH).contains(&duty))?;
    Ok(duty)
}

/// Rebuilds a handle. Every channel comes back Idle and resting at its persisted
/// current duty; a move that was in flight when the image was taken is dropped.
///
/// Images a running handle could never hold (duties out of range, inverted
/// limits, unusable timing) are `Corrupt`.
pub fn decode(bytes: &[u8]) -> Result<ServoHandle, StorageError> {
    check(bytes.len() == RECORD_LEN)?;
    let mut r = Reader { buf: bytes, pos: 0 };

    let marker = r.u32();
    check(marker == RECORD_MARKER)?;

    let mut channels = [Channel::new(MIN_PULSEWIDTH); CHANNEL_COUNT];
    for ch in channels.iter_mut() {
        let current = duty(&mut r)?;
        let _target = duty(&mut r)?;
        *ch = Channel::new(current);
    }

    let mut calibration = [Calibration::default_for(0); JOINT_COUNT];
    for cal in calibration.iter_mut() {
        *cal = Calibration {
            scale: r.f32()?,
            bias: r.f32()?,
            lower_limit: duty(&mut r)?,
            upper_limit: duty(&mut r)?,
        };
        check(cal.lower_limit < cal.upper_limit)?;
    }

    let time_full = r.u16();
    let time_balance = r.u16();
    let full_ticks = MIN_MOVE_MS / CONTROL_INTERVAL_MS..=MAX_MOVE_MS / CONTROL_INTERVAL_MS;
    check(full_ticks.contains(&(time_full as u32)))?;
    check(time_balance > 0 && time_balance <= time_full / 2)?;

    let gripper_length = r.f32()?;
    check(gripper_length > 0.0)?;

    Ok(ServoHandle {
        channels,
        calibration,
        time_full,
        time_balance,
        gripper_length,
        marker,
    })
}
