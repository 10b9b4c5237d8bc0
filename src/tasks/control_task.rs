use log::info;

use crate::control::scheduler::ControlLoop;
use crate::hw::flash::FlashKvStore;
use crate::hw::pwm::AnyPwmPin;
use crate::hw::timer::{EVENTS, TICKS};
use crate::robot::servo::ServoBank;
use crate::robot::state::ArmContext;

/// Consumes tick and persistence events for the lifetime of the firmware.
#[embassy_executor::task]
pub async fn control_task(
    ctx: &'static ArmContext<FlashKvStore>,
    servos: ServoBank<AnyPwmPin>,
) {
    let mut control = ControlLoop::new(servos);
    info!("[CONTROL_TASK] waiting for ticks");

    loop {
        let event = EVENTS.receive().await;
        control.handle(event, ctx);
        control.report_drops(TICKS.dropped());
    }
}
