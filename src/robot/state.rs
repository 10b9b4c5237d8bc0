//! Live state of the arm and the context the tasks share it through.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::{info, warn};

use crate::config::{
    CHANNEL_COUNT, CONTROL_INTERVAL_MS, DEFAULT_TIME_BALANCE, DEFAULT_TIME_FULL, GRIPPER_CHANNEL,
    HOME_DUTY, JOINT_COUNT, MAX_MOVE_MS, MAX_PULSEWIDTH, MIN_MOVE_MS, MIN_PULSEWIDTH,
    RECORD_MARKER,
};
use crate::error::{ArmError, InvalidArgument, StorageError};
use crate::kinematics::{gripper, solver, solver::Pose};
use crate::robot::calibration::{default_calibration, Bound, Calibration};
use crate::robot::channel::{Channel, ChannelStatus};
use crate::robot::joint::Joint;
use crate::storage::{record, CalibrationStore, KvStore};

/// Everything the arm knows about its channels. Persisted as one record.
#[derive(Debug, Clone, PartialEq)]
pub struct ServoHandle {
    pub(crate) channels: [Channel; CHANNEL_COUNT],
    pub(crate) calibration: [Calibration; JOINT_COUNT],
    /// Move duration in ticks.
    pub(crate) time_full: u16,
    /// Blend duration in ticks.
    pub(crate) time_balance: u16,
    /// Wrist-to-fingertip length for the current gripper opening, cm.
    pub(crate) gripper_length: f32,
    pub(crate) marker: u32,
}

impl ServoHandle {
    /// Home pose, compiled-in limits and timing.
    pub fn defaults() -> Self {
        Self {
            channels: HOME_DUTY.map(Channel::new),
            calibration: default_calibration(),
            time_full: DEFAULT_TIME_FULL,
            time_balance: DEFAULT_TIME_BALANCE,
            gripper_length: gripper::duty_to_length(HOME_DUTY[GRIPPER_CHANNEL]),
            marker: RECORD_MARKER,
        }
    }

    pub fn channel(&self, joint: Joint) -> &Channel {
        &self.channels[joint as usize]
    }

    pub fn calibration(&self) -> &[Calibration; JOINT_COUNT] {
        &self.calibration
    }

    pub fn timing(&self) -> (u16, u16) {
        (self.time_full, self.time_balance)
    }

    pub fn gripper_length(&self) -> f32 {
        self.gripper_length
    }

    pub fn duties(&self) -> [u16; CHANNEL_COUNT] {
        self.channels.map(|ch| ch.current())
    }

    /// Error beats Running beats Idle.
    pub fn status(&self) -> ChannelStatus {
        let statuses = self.channels.map(|ch| ch.status());
        if statuses.contains(&ChannelStatus::Error) {
            ChannelStatus::Error
        } else if statuses.contains(&ChannelStatus::Running) {
            ChannelStatus::Running
        } else {
            ChannelStatus::Idle
        }
    }

    /// First channel with a latched fault.
    pub fn faulted_channel(&self) -> Option<usize> {
        self.channels
            .iter()
            .position(|ch| ch.status() == ChannelStatus::Error)
    }

    fn retarget(&mut self, joint: Joint, duty: u16) {
        let (full, balance) = (self.time_full, self.time_balance);
        self.channels[joint as usize].retarget(duty, full, balance);
    }

    /// Retargets the five calibrated joints, gripper untouched.
    pub fn move_joints(&mut self, duties: [u16; JOINT_COUNT]) {
        for (joint, duty) in Joint::ALL.into_iter().zip(duties) {
            self.retarget(joint, duty);
        }
    }

    pub fn set_gripper_width(&mut self, width: f32) -> Result<(), InvalidArgument> {
        let setting = gripper::width_to_setting(width)?;
        self.retarget(Joint::Gripper, setting.duty);
        self.gripper_length = setting.effective_length;
        Ok(())
    }

    pub fn set_home(&mut self) {
        for (joint, duty) in Joint::ALL.into_iter().zip(HOME_DUTY) {
            self.retarget(joint, duty);
        }
        self.gripper_length = gripper::duty_to_length(HOME_DUTY[GRIPPER_CHANNEL]);
    }

    /// Raw pulse width on any channel, bypassing calibration.
    pub fn set_duty(&mut self, channel: usize, duty: u16) -> Result<(), InvalidArgument> {
        let joint = Joint::try_from(channel)?;
        if !(MIN_PULSEWIDTH..=MAX_PULSEWIDTH).contains(&duty) {
            return Err(InvalidArgument::Duty(duty));
        }
        self.retarget(joint, duty);
        if joint == Joint::Gripper {
            self.gripper_length = gripper::duty_to_length(duty);
        }
        Ok(())
    }

    /// Move and blend durations for the next commands, in ms.
    pub fn set_timing(&mut self, full_ms: u32, balance_ms: u32) -> Result<(), InvalidArgument> {
        let rejected = InvalidArgument::Timing {
            full_ms,
            balance_ms,
        };
        if !(MIN_MOVE_MS..=MAX_MOVE_MS).contains(&full_ms) || balance_ms > full_ms / 2 {
            return Err(rejected);
        }
        let full = (full_ms / CONTROL_INTERVAL_MS) as u16;
        let balance = (balance_ms / CONTROL_INTERVAL_MS) as u16;
        if balance == 0 {
            return Err(rejected);
        }
        self.time_full = full;
        self.time_balance = balance;
        Ok(())
    }

    fn calibrated(channel: usize) -> Result<Joint, InvalidArgument> {
        let joint = Joint::try_from(channel)?;
        if !joint.is_calibrated() {
            return Err(InvalidArgument::Channel(channel));
        }
        Ok(joint)
    }

    /// Takes the channel's commanded target as its new `bound`.
    pub fn capture_limit(&mut self, channel: usize, bound: Bound) -> Result<(), InvalidArgument> {
        let joint = Self::calibrated(channel)?;
        let duty = self.channel(joint).target();
        if !self.calibration[channel].set_limit(bound, duty) {
            return Err(InvalidArgument::Limit { channel, duty });
        }
        Ok(())
    }

    /// Puts `bound` back to its compiled-in value.
    pub fn restore_limit(&mut self, channel: usize, bound: Bound) -> Result<(), InvalidArgument> {
        Self::calibrated(channel)?;
        let duty = Calibration::default_for(channel).limit(bound);
        if !self.calibration[channel].set_limit(bound, duty) {
            return Err(InvalidArgument::Limit { channel, duty });
        }
        Ok(())
    }

    /// One control period: latch faults, clamp, step every running channel.
    ///
    /// Returns the duties to export.
    pub fn tick(&mut self) -> [u16; CHANNEL_COUNT] {
        for ch in self.channels.iter_mut() {
            ch.check_fault();
            ch.clamp();
            ch.advance();
        }
        self.duties()
    }
}

impl Default for ServoHandle {
    fn default() -> Self {
        Self::defaults()
    }
}

/// State shared by the control task and the serial task.
///
/// The servo handle and the store sit behind separate locks so that a flash write
/// never runs with the handle locked.
pub struct ArmContext<S> {
    servo: Mutex<CriticalSectionRawMutex, RefCell<ServoHandle>>,
    store: Mutex<CriticalSectionRawMutex, RefCell<CalibrationStore<S>>>,
}

impl<S: KvStore> ArmContext<S> {
    /// Loads the handle from `store`, falling back to defaults.
    pub fn new(mut store: CalibrationStore<S>) -> Self {
        let handle = store.load();
        Self {
            servo: Mutex::new(RefCell::new(handle)),
            store: Mutex::new(RefCell::new(store)),
        }
    }

    /// Runs `f` with the handle locked.
    pub fn with_servo<R>(&self, f: impl FnOnce(&mut ServoHandle) -> R) -> R {
        self.servo.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Solves `pose` against a copy of the tool length and calibration, then
    /// locks only to retarget. Nothing moves on failure.
    pub fn set_position(&self, pose: &Pose) -> Result<(), InvalidArgument> {
        let (tool_length, calibration) =
            self.with_servo(|handle| (handle.gripper_length, handle.calibration));
        let duties = solver::solve(pose, tool_length, &calibration)?;
        self.with_servo(|handle| handle.move_joints(duties));
        Ok(())
    }

    fn save(&self, image: &record::Record) -> Result<(), StorageError> {
        self.store.lock(|cell| cell.borrow_mut().save_record(image))
    }

    #[cfg(test)]
    pub(crate) fn with_backend<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        self.store.lock(|cell| f(cell.borrow_mut().backend_mut()))
    }

    /// Snapshots the handle and writes it out.
    pub fn persist(&self) -> Result<(), StorageError> {
        let image = self.with_servo(|handle| record::encode(handle));
        self.save(&image)
    }

    fn update_limit(
        &self,
        channel: usize,
        bound: Bound,
        f: impl FnOnce(&mut ServoHandle) -> Result<(), InvalidArgument>,
    ) -> Result<(), ArmError> {
        let (image, duty) = self.with_servo(|handle| {
            f(handle)?;
            let duty = handle.calibration[channel].limit(bound);
            Ok::<_, InvalidArgument>((record::encode(handle), duty))
        })?;
        info!("[STORE] channel {channel} {bound:?} limit -> {duty} us");
        if let Err(e) = self.save(&image) {
            warn!("[STORE] limit kept in memory only: {e}");
            return Err(e.into());
        }
        Ok(())
    }

    /// Captures the commanded target of `channel` as a limit and persists it.
    pub fn set_limit(&self, channel: usize, bound: Bound) -> Result<(), ArmError> {
        self.update_limit(channel, bound, |handle| handle.capture_limit(channel, bound))
    }

    pub fn restore_limit(&self, channel: usize, bound: Bound) -> Result<(), ArmError> {
        self.update_limit(channel, bound, |handle| handle.restore_limit(channel, bound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::MemoryStore;

    #[test]
    fn defaults_rest_at_home() {
        let handle = ServoHandle::defaults();
        assert_eq!(handle.duties(), HOME_DUTY);
        assert_eq!(handle.status(), ChannelStatus::Idle);
        assert_eq!(handle.timing(), (DEFAULT_TIME_FULL, DEFAULT_TIME_BALANCE));
        assert!((handle.gripper_length() - 6.4).abs() < 1e-4);
    }

    #[test]
    fn set_duty_validates_before_touching_anything() {
        let mut handle = ServoHandle::defaults();
        assert_eq!(handle.set_duty(1, 3000), Err(InvalidArgument::Duty(3000)));
        assert_eq!(handle.set_duty(6, 1500), Err(InvalidArgument::Channel(6)));
        assert_eq!(handle, ServoHandle::defaults());

        handle.set_duty(1, 1800).unwrap();
        assert_eq!(handle.channel(Joint::Shoulder).target(), 1800);
        assert_eq!(handle.status(), ChannelStatus::Running);
    }

    #[test]
    fn gripper_duty_updates_tool_length() {
        let mut handle = ServoHandle::defaults();
        handle.set_duty(GRIPPER_CHANNEL, 1900).unwrap();
        assert!((handle.gripper_length() - 7.0).abs() < 1e-4);

        handle.set_gripper_width(6.0).unwrap();
        assert_eq!(handle.channel(Joint::Gripper).target(), 1100);
        assert!((handle.gripper_length() - 6.0).abs() < 1e-4);
    }

    fn context() -> ArmContext<MemoryStore> {
        ArmContext::new(CalibrationStore::new(MemoryStore::default()))
    }

    #[test]
    fn failed_solve_commits_nothing() {
        let ctx = context();
        assert!(ctx.set_position(&Pose::new(30.0, 0.0, 5.0)).is_err());
        assert!(ctx.set_position(&Pose::new(10.0, 12.0, 5.0)).is_err());
        ctx.with_servo(|handle| assert_eq!(*handle, ServoHandle::defaults()));
    }

    #[test]
    fn set_position_retargets_joints_only() {
        let ctx = context();
        ctx.with_servo(|handle| handle.set_gripper_width(3.0)).unwrap();
        let pose = Pose::new(12.0, 5.0, 8.0);
        let expected = ctx
            .with_servo(|handle| solver::solve(&pose, handle.gripper_length(), handle.calibration()))
            .unwrap();

        ctx.set_position(&pose).unwrap();
        ctx.with_servo(|handle| {
            for (joint, duty) in Joint::ALL.into_iter().zip(expected) {
                assert_eq!(handle.channel(joint).target(), duty, "{joint}");
            }
            assert_eq!(handle.channel(Joint::Gripper).target(), 1650);
        });
    }

    #[test]
    fn ticks_move_all_channels_to_their_targets() {
        let mut handle = ServoHandle::defaults();
        let duties =
            solver::solve(&Pose::new(15.0, 0.0, 5.0), handle.gripper_length(), handle.calibration())
                .unwrap();
        handle.move_joints(duties);
        let targets = handle.channels.map(|ch| ch.target());
        for _ in 0..DEFAULT_TIME_FULL {
            for duty in handle.tick() {
                assert!((MIN_PULSEWIDTH..=MAX_PULSEWIDTH).contains(&duty));
            }
        }
        assert_eq!(handle.duties(), targets);
        assert_eq!(handle.status(), ChannelStatus::Idle);
    }

    #[test]
    fn fault_dominates_aggregate_status() {
        let mut handle = ServoHandle::defaults();
        handle.set_duty(0, 2000).unwrap();
        handle.channels[3] = Channel::restore(0, 0);
        handle.tick();
        assert_eq!(handle.status(), ChannelStatus::Error);
        assert_eq!(handle.faulted_channel(), Some(3));
        assert_eq!(handle.channel(Joint::Wrist).current(), MIN_PULSEWIDTH);
    }

    #[test]
    fn timing_is_stored_in_ticks() {
        let mut handle = ServoHandle::defaults();
        handle.set_timing(2000, 400).unwrap();
        assert_eq!(handle.timing(), (100, 20));

        for (full, balance) in [(400, 100), (6000, 100), (1000, 600), (1000, 0), (1000, 10)] {
            assert_eq!(
                handle.set_timing(full, balance),
                Err(InvalidArgument::Timing {
                    full_ms: full,
                    balance_ms: balance
                })
            );
        }
        assert_eq!(handle.timing(), (100, 20));
    }

    #[test]
    fn limits_follow_commanded_targets() {
        let mut handle = ServoHandle::defaults();
        handle.set_duty(2, 2300).unwrap();
        handle.capture_limit(2, Bound::Upper).unwrap();
        assert_eq!(handle.calibration()[2].upper_limit, 2300);

        // Lower cannot climb over the upper limit.
        handle.set_duty(2, 2400).unwrap();
        assert_eq!(
            handle.capture_limit(2, Bound::Lower),
            Err(InvalidArgument::Limit {
                channel: 2,
                duty: 2400
            })
        );
        assert_eq!(
            handle.capture_limit(GRIPPER_CHANNEL, Bound::Upper),
            Err(InvalidArgument::Channel(GRIPPER_CHANNEL))
        );

        handle.restore_limit(2, Bound::Upper).unwrap();
        assert_eq!(handle.calibration()[2].upper_limit, 2000);
    }

    #[test]
    fn context_persists_limit_changes() {
        let ctx = context();
        ctx.with_servo(|handle| handle.set_duty(0, 1200)).unwrap();
        ctx.set_limit(0, Bound::Lower).unwrap();

        let reloaded = ctx.store.lock(|cell| cell.borrow_mut().load());
        assert_eq!(reloaded.calibration()[0].lower_limit, 1200);
    }

    #[test]
    fn context_reports_failed_limit_writes() {
        let ctx = context();
        ctx.with_backend(|store| store.fail_writes = true);
        ctx.with_servo(|handle| handle.set_duty(0, 1200)).unwrap();

        assert_eq!(
            ctx.set_limit(0, Bound::Lower),
            Err(ArmError::Storage(StorageError::Io))
        );
        // The handle keeps the new limit.
        ctx.with_servo(|handle| assert_eq!(handle.calibration()[0].lower_limit, 1200));
        assert_eq!(ctx.persist(), Err(StorageError::Io));
    }
}
