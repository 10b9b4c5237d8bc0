//! Command types for the serial link.
//!
//! A payload reads `"<id> <VERB> <args>"`. Parsing happens in two steps so the
//! dispatcher can tell an unknown verb (`ERROR COMMAND`) apart from a known verb
//! with bad arguments (`ERROR ARGUMENT`).
use core::str::FromStr;

use heapless::String;

use crate::config::RX_BUF_SIZE;
use crate::error::InvalidArgument;
use crate::kinematics::solver::Pose;
use crate::robot::calibration::Bound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    SetPos,
    SetWid,
    SetHome,
    SetDuty,
    Save,
    SetTime,
    SetLimit,
    ResetLimit,
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SETPOS" => Ok(Verb::SetPos),
            "SETWID" => Ok(Verb::SetWid),
            "SETHOME" => Ok(Verb::SetHome),
            "SETDUTY" => Ok(Verb::SetDuty),
            "SAVE" => Ok(Verb::Save),
            "SETTIME" => Ok(Verb::SetTime),
            "SETLIMIT" => Ok(Verb::SetLimit),
            "RESETLIMIT" => Ok(Verb::ResetLimit),
            _ => Err(()),
        }
    }
}

/// The payload is not a command. `id` is kept when it parsed.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseCommandError {
    pub id: Option<u32>,
}

/// A recognized command whose arguments are not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub id: u32,
    pub verb: Verb,
    pub args: String<RX_BUF_SIZE>,
}

impl TryFrom<&str> for Command {
    type Error = ParseCommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut tokens = value.trim().split_whitespace();

        let id = tokens
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or(ParseCommandError { id: None })?;
        let verb = tokens
            .next()
            .and_then(|s| s.parse::<Verb>().ok())
            .ok_or(ParseCommandError { id: Some(id) })?;

        let mut args = String::new();
        for token in tokens {
            if !args.is_empty() {
                args.push(' ').map_err(|_| ParseCommandError { id: Some(id) })?;
            }
            args.push_str(token)
                .map_err(|_| ParseCommandError { id: Some(id) })?;
        }
        Ok(Command { id, verb, args })
    }
}

/// A validated request, ready to apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Position(Pose),
    Width(f32),
    Home,
    Duty { duty: u16, channel: usize },
    Save,
    Timing { full_ms: u32, balance_ms: u32 },
    SetLimit { channel: usize, bound: Bound },
    ResetLimit { channel: usize, bound: Bound },
}

struct Args<'a>(core::str::SplitWhitespace<'a>);

impl Args<'_> {
    fn next<T: FromStr>(&mut self) -> Result<T, InvalidArgument> {
        self.0
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(InvalidArgument::Malformed)
    }

    fn optional<T: FromStr>(&mut self) -> Result<Option<T>, InvalidArgument> {
        self.0
            .next()
            .map(|s| s.parse().map_err(|_| InvalidArgument::Malformed))
            .transpose()
    }

    fn end(mut self) -> Result<(), InvalidArgument> {
        match self.0.next() {
            None => Ok(()),
            Some(_) => Err(InvalidArgument::Malformed),
        }
    }
}

impl Command {
    /// Parses the arguments for this verb. Range checks happen when the action is
    /// applied.
    pub fn action(&self) -> Result<Action, InvalidArgument> {
        let mut args = Args(self.args.split_whitespace());
        let action = match self.verb {
            Verb::SetPos => {
                let mut pose = Pose::new(args.next()?, args.next()?, args.next()?);
                pose.roll = args.optional()?;
                Action::Position(pose)
            }
            Verb::SetWid => Action::Width(args.next()?),
            Verb::SetHome => Action::Home,
            Verb::SetDuty => Action::Duty {
                duty: args.next()?,
                channel: args.next()?,
            },
            Verb::Save => Action::Save,
            Verb::SetTime => Action::Timing {
                full_ms: args.next()?,
                balance_ms: args.next()?,
            },
            Verb::SetLimit => Action::SetLimit {
                channel: args.next()?,
                bound: args.next()?,
            },
            Verb::ResetLimit => Action::ResetLimit {
                channel: args.next()?,
                bound: args.next()?,
            },
        };
        args.end()?;
        Ok(action)
    }
}
