//! Control tick interrupt.
//!
//! A timer-group timer fires every [`CONTROL_INTERVAL_MS`]; its handler only clears
//! the interrupt and calls [`TickSource::on_interrupt`].
use core::cell::RefCell;

use critical_section::Mutex;
use esp_hal::handler;
use esp_hal::time::Duration;
use esp_hal::timer::PeriodicTimer;
use esp_hal::Blocking;

use crate::config::{CONTROL_INTERVAL_MS, PERSIST_INTERVAL_TICKS};
use crate::control::scheduler::{EventQueue, TickSource};

pub static EVENTS: EventQueue = EventQueue::new();
pub static TICKS: TickSource<'static> = TickSource::new(&EVENTS, PERSIST_INTERVAL_TICKS);

static TICK_TIMER: Mutex<RefCell<Option<PeriodicTimer<'static, Blocking>>>> =
    Mutex::new(RefCell::new(None));

/// Arms `timer` as the control tick and parks it where the handler can reach it.
pub fn start_ticks(mut timer: PeriodicTimer<'static, Blocking>) -> anyhow::Result<()> {
    timer.set_interrupt_handler(tick_handler);
    timer.listen();
    timer
        .start(Duration::from_millis(CONTROL_INTERVAL_MS as u64))
        .map_err(|e| anyhow::anyhow!("tick timer: {:?}", e))?;

    critical_section::with(|cs| TICK_TIMER.borrow_ref_mut(cs).replace(timer));
    Ok(())
}

#[handler]
fn tick_handler() {
    critical_section::with(|cs| {
        if let Some(timer) = TICK_TIMER.borrow_ref_mut(cs).as_mut() {
            timer.clear_interrupt();
        }
    });
    TICKS.on_interrupt();
}
