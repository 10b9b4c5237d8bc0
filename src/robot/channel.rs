//! One PWM channel: where it is, where it is going and how it gets there.
use crate::config::{MAX_PULSEWIDTH, MIN_PULSEWIDTH};
use crate::kinematics::trajectory::Trajectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    Idle,
    Running,
    /// Latched actuator fault. Only a new target clears it.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    duty_current: u16,
    duty_target: u16,
    trajectory: Trajectory,
    elapsed: u32,
    status: ChannelStatus,
}

impl Channel {
    /// A channel resting at `duty`.
    pub fn new(duty: u16) -> Self {
        Self {
            duty_current: duty,
            duty_target: duty,
            trajectory: Trajectory::plan(duty, duty, 2, 1),
            elapsed: 0,
            status: ChannelStatus::Idle,
        }
    }

    /// Idle channel with arbitrary duties, for fault and clamp scenarios.
    #[cfg(test)]
    pub(crate) fn restore(current: u16, target: u16) -> Self {
        Self {
            duty_target: target,
            ..Self::new(current)
        }
    }

    pub fn current(&self) -> u16 {
        self.duty_current
    }

    pub fn target(&self) -> u16 {
        self.duty_target
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Replans from the live position towards `target`.
    ///
    /// A move already in progress is overwritten, not cancelled: the new profile
    /// starts wherever the channel is now. A zero-length move leaves the channel
    /// Idle.
    pub fn retarget(&mut self, target: u16, total_ticks: u16, blend_ticks: u16) {
        self.duty_target = target;
        self.trajectory = Trajectory::plan(self.duty_current, target, total_ticks, blend_ticks);
        self.elapsed = 0;
        self.status = if self.trajectory.is_still() {
            ChannelStatus::Idle
        } else {
            ChannelStatus::Running
        };
    }

    /// Latches an actuator fault on a degenerate zero duty. Returns whether the
    /// channel is faulted.
    pub fn check_fault(&mut self) -> bool {
        if self.duty_current == 0 || self.duty_target == 0 {
            self.status = ChannelStatus::Error;
        }
        self.status == ChannelStatus::Error
    }

    /// Forces both duties into the safe pulse range.
    pub fn clamp(&mut self) {
        self.duty_current = self.duty_current.clamp(MIN_PULSEWIDTH, MAX_PULSEWIDTH);
        self.duty_target = self.duty_target.clamp(MIN_PULSEWIDTH, MAX_PULSEWIDTH);
    }

    /// One planner step. Faulted and idle channels hold still.
    pub fn advance(&mut self) {
        if self.status != ChannelStatus::Running {
            return;
        }
        self.elapsed += 1;
        let sample = self.trajectory.sample(self.elapsed);
        self.duty_current = ((sample + 0.5) as u16).clamp(MIN_PULSEWIDTH, MAX_PULSEWIDTH);
        if self.trajectory.is_finished(self.elapsed) {
            self.duty_current = self.duty_target;
            self.status = ChannelStatus::Idle;
        }
    }
}
