//! Periodic tick hand-off from interrupt to the control task.
//!
//! The timer interrupt only calls [`TickSource::on_interrupt`], which posts fixed
//! size [`Event`]s with `try_send`. Everything that takes time happens in
//! [`ControlLoop::handle`] on the task side.
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, error, warn};

use crate::config::{CHANNEL_COUNT, EVENT_QUEUE_SIZE, MAX_PULSEWIDTH, MIN_PULSEWIDTH, TICK_RESERVE};
use crate::robot::channel::ChannelStatus;
use crate::robot::servo::PwmSink;
use crate::robot::state::ArmContext;
use crate::storage::KvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    PersistRequest,
}

pub type EventQueue = Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_SIZE>;

/// Events the interrupt could not queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DropCounts {
    pub ticks: u32,
    pub persists: u32,
}

/// Interrupt-side producer of control events.
pub struct TickSource<'a> {
    queue: &'a EventQueue,
    persist_every: u32,
    countdown: AtomicU32,
    dropped_ticks: AtomicU32,
    dropped_persists: AtomicU32,
}

impl<'a> TickSource<'a> {
    pub const fn new(queue: &'a EventQueue, persist_every: u32) -> Self {
        Self {
            queue,
            persist_every,
            countdown: AtomicU32::new(persist_every),
            dropped_ticks: AtomicU32::new(0),
            dropped_persists: AtomicU32::new(0),
        }
    }

    /// Called once per timer period from interrupt context. Never blocks.
    ///
    /// A persistence request is only queued while it leaves [`TICK_RESERVE`] free
    /// slots, so it never takes a tick's place. A skipped request waits for the
    /// next interval.
    pub fn on_interrupt(&self) {
        if self.queue.try_send(Event::Tick).is_err() {
            self.dropped_ticks.fetch_add(1, Ordering::Relaxed);
        }

        let left = self.countdown.load(Ordering::Relaxed).saturating_sub(1);
        if left > 0 {
            self.countdown.store(left, Ordering::Relaxed);
            return;
        }
        self.countdown.store(self.persist_every, Ordering::Relaxed);

        let queued = self.queue.free_capacity() > TICK_RESERVE
            && self.queue.try_send(Event::PersistRequest).is_ok();
        if !queued {
            self.dropped_persists.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped(&self) -> DropCounts {
        DropCounts {
            ticks: self.dropped_ticks.load(Ordering::Relaxed),
            persists: self.dropped_persists.load(Ordering::Relaxed),
        }
    }
}

/// Task-side consumer: steps the arm and feeds the PWM outputs.
pub struct ControlLoop<P> {
    sink: P,
    seen: DropCounts,
    faulted: bool,
}

impl<P: PwmSink> ControlLoop<P> {
    pub fn new(sink: P) -> Self {
        Self {
            sink,
            seen: DropCounts::default(),
            faulted: false,
        }
    }

    pub fn handle<S: KvStore>(&mut self, event: Event, ctx: &ArmContext<S>) {
        match event {
            Event::Tick => {
                let (duties, status) = ctx.with_servo(|handle| {
                    let duties = handle.tick();
                    (duties, handle.status())
                });

                let faulted = status == ChannelStatus::Error;
                if faulted && !self.faulted {
                    error!("[CONTROL_TASK] actuator fault, duties {:?}", duties);
                }
                self.faulted = faulted;

                let duties: [u16; CHANNEL_COUNT] =
                    duties.map(|d| d.clamp(MIN_PULSEWIDTH, MAX_PULSEWIDTH));
                self.sink.export(&duties);
            }
            Event::PersistRequest => match ctx.persist() {
                Ok(()) => debug!("[CONTROL_TASK] handle persisted"),
                Err(e) => warn!("[CONTROL_TASK] periodic save failed: {e}"),
            },
        }
    }

    /// Logs when the interrupt has dropped events since the last call.
    pub fn report_drops(&mut self, counts: DropCounts) {
        if counts.ticks > self.seen.ticks {
            warn!(
                "[CONTROL_TASK] {} ticks dropped",
                counts.ticks - self.seen.ticks
            );
        }
        if counts.persists > self.seen.persists {
            warn!(
                "[CONTROL_TASK] {} persistence requests dropped",
                counts.persists - self.seen.persists
            );
        }
        self.seen = counts;
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TIME_FULL;
    use crate::robot::channel::Channel as ServoChannel;
    use crate::robot::joint::Joint;
    use crate::storage::tests::MemoryStore;
    use crate::storage::CalibrationStore;

    #[derive(Default)]
    struct RecordingSink {
        exports: Vec<[u16; CHANNEL_COUNT]>,
    }

    impl PwmSink for RecordingSink {
        fn export(&mut self, duties: &[u16; CHANNEL_COUNT]) {
            self.exports.push(*duties);
        }
    }

    fn context() -> ArmContext<MemoryStore> {
        ArmContext::new(CalibrationStore::new(MemoryStore::default()))
    }

    fn drain(queue: &EventQueue) -> Vec<Event> {
        core::iter::from_fn(|| queue.try_receive().ok()).collect()
    }

    #[test]
    fn posts_tick_every_interrupt_and_persist_on_interval() {
        let queue = EventQueue::new();
        let source = TickSource::new(&queue, 3);
        for _ in 0..6 {
            source.on_interrupt();
        }
        assert_eq!(
            drain(&queue),
            [
                Event::Tick,
                Event::Tick,
                Event::Tick,
                Event::PersistRequest,
                Event::Tick,
                Event::Tick,
                Event::Tick,
                Event::PersistRequest,
            ]
        );
        assert_eq!(source.dropped(), DropCounts::default());
    }

    #[test]
    fn persist_never_displaces_ticks() {
        let queue = EventQueue::new();
        let source = TickSource::new(&queue, 1);
        // Nobody consumes: the queue fills up with ticks only past the reserve.
        for _ in 0..EVENT_QUEUE_SIZE + 5 {
            source.on_interrupt();
        }
        let events = drain(&queue);
        assert_eq!(events.len(), EVENT_QUEUE_SIZE);
        let persists = events.iter().filter(|e| **e == Event::PersistRequest).count();
        let ticks = events.len() - persists;
        assert_eq!(ticks + source.dropped().ticks as usize, EVENT_QUEUE_SIZE + 5);
        assert_eq!(persists + source.dropped().persists as usize, EVENT_QUEUE_SIZE + 5);
        assert!(ticks >= TICK_RESERVE);
        assert_eq!(persists, (EVENT_QUEUE_SIZE - TICK_RESERVE) / 2);
    }

    #[test]
    fn dropped_persist_waits_for_next_interval() {
        let queue = EventQueue::new();
        let source = TickSource::new(&queue, 2);
        for _ in 0..EVENT_QUEUE_SIZE - TICK_RESERVE {
            queue.try_send(Event::Tick).unwrap();
        }
        source.on_interrupt();
        source.on_interrupt();
        assert_eq!(source.dropped().persists, 1);
        assert!(!drain(&queue).contains(&Event::PersistRequest));

        source.on_interrupt();
        source.on_interrupt();
        assert!(drain(&queue).contains(&Event::PersistRequest));
    }

    #[test]
    fn ticks_export_safe_duties() {
        let ctx = context();
        ctx.with_servo(|h| h.set_duty(1, 2500)).unwrap();
        ctx.with_servo(|h| h.channels[2] = ServoChannel::restore(3000, 2600));
        let mut control = ControlLoop::new(RecordingSink::default());

        for _ in 0..DEFAULT_TIME_FULL {
            control.handle(Event::Tick, &ctx);
        }
        for duties in &control.sink().exports {
            assert!(duties
                .iter()
                .all(|d| (MIN_PULSEWIDTH..=MAX_PULSEWIDTH).contains(d)));
        }
        let last = control.sink().exports.last().unwrap();
        assert_eq!(last[Joint::Shoulder as usize], 2500);
        assert_eq!(last[Joint::Elbow as usize], MAX_PULSEWIDTH);
    }

    #[test]
    fn zero_duty_channel_is_faulted_and_exported_clamped() {
        let ctx = context();
        ctx.with_servo(|h| h.channels[0] = ServoChannel::restore(0, 1500));
        let mut control = ControlLoop::new(RecordingSink::default());
        control.handle(Event::Tick, &ctx);

        assert_eq!(control.sink().exports[0][0], MIN_PULSEWIDTH);
        ctx.with_servo(|h| {
            assert_eq!(h.status(), ChannelStatus::Error);
            assert_ne!(h.channel(Joint::Base).current(), 0);
        });
    }

    #[test]
    fn persist_request_and_drop_report() {
        let ctx = context();
        ctx.with_servo(|h| h.set_duty(4, 1800)).unwrap();
        let mut control = ControlLoop::new(RecordingSink::default());
        control.handle(Event::PersistRequest, &ctx);
        control.report_drops(DropCounts {
            ticks: 1,
            persists: 0,
        });
        assert_eq!(
            control.seen,
            DropCounts {
                ticks: 1,
                persists: 0
            }
        );
    }
}
