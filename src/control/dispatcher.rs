//! Command dispatcher: frames in, status lines out.
//!
//! ```text
//! Idle --frame--> Verb --applied--> Reporting --all idle--> Idle
//!   |               |                   |
//!   +-bad frame-----+-bad args----------+-fault------------> Idle
//! ```
//!
//! Frames that arrive while a move is being reported wait in the receiver and are
//! taken once the dispatcher is back in Idle.
use log::{error, info, warn};

use crate::config::RX_BUF_SIZE;
use crate::error::{ArmError, ProtocolError};
use crate::protocol::{framing, FrameReceiver, Response, Status};
use crate::robot::channel::ChannelStatus;
use crate::robot::commands::{Action, Command, ParseCommandError};
use crate::robot::state::ArmContext;
use crate::storage::KvStore;

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Verb(Command),
    Reporting { id: u32 },
}

pub struct Dispatcher {
    receiver: FrameReceiver,
    state: State,
    /// Id of the last command that parsed, for `OVERFLOW` reports.
    last_id: u32,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            receiver: FrameReceiver::new(),
            state: State::Idle,
            last_id: 0,
        }
    }

    /// Takes one byte off the wire. Returns the response to send if the byte
    /// overflowed the receive buffer.
    pub fn feed(&mut self, byte: u8) -> Option<Response> {
        match self.receiver.push(byte) {
            Ok(()) => None,
            Err(e) => {
                warn!("[DISPATCHER] {e}");
                Some(Response::new(self.last_id, Status::Overflow))
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Runs the state machine until it either has something to say or has to wait.
    /// Call repeatedly until it returns `None`.
    pub fn poll<S: KvStore>(&mut self, ctx: &ArmContext<S>) -> Option<Response> {
        loop {
            match core::mem::replace(&mut self.state, State::Idle) {
                State::Idle => {
                    let frame = self.receiver.next_frame()?;
                    match self.accept(&frame) {
                        Ok(cmd) => self.state = State::Verb(cmd),
                        Err(response) => return Some(response),
                    }
                }
                State::Verb(cmd) => return Some(self.execute(cmd, ctx)),
                State::Reporting { id } => {
                    let (status, faulted) =
                        ctx.with_servo(|handle| (handle.status(), handle.faulted_channel()));
                    return match status {
                        ChannelStatus::Running => {
                            self.state = State::Reporting { id };
                            None
                        }
                        ChannelStatus::Idle => Some(Response::new(id, Status::Done)),
                        ChannelStatus::Error => {
                            let channel = faulted.unwrap_or_default();
                            error!("[DISPATCHER] {id}: {}", ArmError::ActuatorFault { channel });
                            Some(Response::new(id, Status::Error))
                        }
                    };
                }
            }
        }
    }

    fn accept(&mut self, frame: &[u8]) -> Result<Command, Response> {
        let payload = framing::decode::<RX_BUF_SIZE>(frame).map_err(|e: ProtocolError| {
            warn!("[DISPATCHER] dropped frame: {e}");
            Response::anonymous(Status::ErrorTransmit)
        })?;

        let rejected = |ParseCommandError { id }| match id {
            Some(id) => Response::new(id, Status::ErrorCommand),
            None => Response::anonymous(Status::ErrorCommand),
        };
        let text = core::str::from_utf8(&payload)
            .map_err(|_| rejected(ParseCommandError { id: None }))?;
        let cmd = Command::try_from(text).map_err(rejected)?;

        self.last_id = cmd.id;
        info!("[DISPATCHER] {} {:?} {}", cmd.id, cmd.verb, cmd.args);
        Ok(cmd)
    }

    fn execute<S: KvStore>(&mut self, cmd: Command, ctx: &ArmContext<S>) -> Response {
        let id = cmd.id;
        let action = match cmd.action() {
            Ok(action) => action,
            Err(e) => {
                warn!("[DISPATCHER] {id}: {e}");
                return Response::new(id, Status::ErrorArgument);
            }
        };

        let applied: Result<(), ArmError> = match action {
            Action::Position(pose) => ctx.set_position(&pose).map_err(Into::into),
            Action::Width(width) => ctx
                .with_servo(|handle| handle.set_gripper_width(width))
                .map_err(Into::into),
            Action::Home => {
                ctx.with_servo(|handle| handle.set_home());
                Ok(())
            }
            Action::Duty { duty, channel } => ctx
                .with_servo(|handle| handle.set_duty(channel, duty))
                .map_err(Into::into),
            Action::Save => ctx.persist().map_err(Into::into),
            Action::Timing {
                full_ms,
                balance_ms,
            } => ctx
                .with_servo(|handle| handle.set_timing(full_ms, balance_ms))
                .map_err(Into::into),
            Action::SetLimit { channel, bound } => ctx.set_limit(channel, bound),
            Action::ResetLimit { channel, bound } => ctx.restore_limit(channel, bound),
        };

        let status = match applied {
            Ok(()) => Status::Processing,
            Err(ArmError::InvalidArgument(e)) => {
                warn!("[DISPATCHER] {id}: {e}");
                return Response::new(id, Status::ErrorArgument);
            }
            // The new limit is live; the next periodic save retries the write.
            Err(ArmError::Storage(_))
                if matches!(action, Action::SetLimit { .. } | Action::ResetLimit { .. }) =>
            {
                Status::Processing
            }
            Err(e) => {
                error!("[DISPATCHER] {id}: {e}");
                return Response::new(id, Status::Error);
            }
        };
        self.state = State::Reporting { id };
        Response::new(id, status)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
