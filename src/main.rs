#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use core::future::pending;

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{AnyPin, Pin};
use esp_hal::timer::timg::TimerGroup;
use esp_hal::timer::PeriodicTimer;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_storage::FlashStorage;
use log::info;
use servo_arm::config::SERIAL_BAUDRATE;
use servo_arm::hw::flash::FlashKvStore;
use servo_arm::hw::pwm::servo_bank;
use servo_arm::hw::timer::start_ticks;
use servo_arm::robot::state::ArmContext;
use servo_arm::storage::CalibrationStore;
use servo_arm::tasks::control_task::control_task;
use servo_arm::tasks::serial_task::serial_task;

extern crate alloc;
esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.init_with(|| $val)
    }};
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let p = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 32 * 1024);

    let timer0 = TimerGroup::new(p.TIMG1);
    esp_hal_embassy::init(timer0.timer0);
    info!("Embassy initialized");

    // Restores the last saved handle, or writes defaults on first boot.
    let store = CalibrationStore::new(FlashKvStore::new(FlashStorage::new()));
    let ctx = mk_static!(ArmContext<FlashKvStore>, ArmContext::new(store));

    // Channel order: base, shoulder, elbow, wrist, roll, gripper.
    let servo_pins: [AnyPin<'static>; 6] = [
        p.GPIO15.degrade(),
        p.GPIO13.degrade(),
        p.GPIO12.degrade(),
        p.GPIO14.degrade(),
        p.GPIO27.degrade(),
        p.GPIO33.degrade(),
    ];
    let servos = servo_bank(p.MCPWM0, servo_pins).expect("Failed to set up MCPWM");

    let uart = Uart::new(
        p.UART0,
        UartConfig::default().with_baudrate(SERIAL_BAUDRATE),
    )
    .expect("Failed to set up UART0")
    .with_rx(p.GPIO3)
    .with_tx(p.GPIO1)
    .into_async();

    info!("Starting servo arm...");
    spawner
        .spawn(control_task(ctx, servos))
        .expect("Fail spawning control task");
    spawner
        .spawn(serial_task(ctx, uart))
        .expect("Fail spawning serial task");

    // Ticks start last so the first events find a consumer.
    let timer1 = TimerGroup::new(p.TIMG0);
    start_ticks(PeriodicTimer::new(timer1.timer0)).expect("Failed to start control ticks");

    loop {
        pending::<()>().await;
    }
}
