//! MCPWM unit 0 driving the six servo channels at 50 Hz.
use embedded_hal::pwm::{Error as _, ErrorKind, ErrorType, SetDutyCycle};
use esp_hal::gpio::AnyPin;
use esp_hal::mcpwm::operator::{PwmPin, PwmPinConfig};
use esp_hal::mcpwm::timer::PwmWorkingMode;
use esp_hal::mcpwm::{McPwm, PeripheralClockConfig};
use esp_hal::peripherals::MCPWM0;
use esp_hal::time::Rate;
use fugit::RateExtU32;

use crate::config::SERVO_FREQUENCY_HZ;
use crate::robot::joint::Joint;
use crate::robot::servo::{Servo, ServoBank};

/// MCPWM clock after the peripheral prescaler (160 MHz / 16).
const PERIPHERAL_CLOCK_MHZ: u32 = 10;
/// Timer counts per PWM period - 1. With a 50 Hz period one count is 1 µs.
const PERIOD: u16 = 19_999;

type Pin<const OP: u8, const IS_A: bool> = PwmPin<'static, MCPWM0<'static>, OP, IS_A>;

/// The AnyPwmPin enum serves as a wrapper around the six operator outputs, whose
/// types differ by operator and side. This way the servos can live in one array.
pub enum AnyPwmPin {
    Op0A(Pin<0, true>),
    Op0B(Pin<0, false>),
    Op1A(Pin<1, true>),
    Op1B(Pin<1, false>),
    Op2A(Pin<2, true>),
    Op2B(Pin<2, false>),
}

impl ErrorType for AnyPwmPin {
    type Error = ErrorKind;
}

impl SetDutyCycle for AnyPwmPin {
    fn max_duty_cycle(&self) -> u16 {
        match self {
            AnyPwmPin::Op0A(pin) => pin.max_duty_cycle(),
            AnyPwmPin::Op0B(pin) => pin.max_duty_cycle(),
            AnyPwmPin::Op1A(pin) => pin.max_duty_cycle(),
            AnyPwmPin::Op1B(pin) => pin.max_duty_cycle(),
            AnyPwmPin::Op2A(pin) => pin.max_duty_cycle(),
            AnyPwmPin::Op2B(pin) => pin.max_duty_cycle(),
        }
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        match self {
            AnyPwmPin::Op0A(pin) => pin.set_duty_cycle(duty).map_err(|e| e.kind()),
            AnyPwmPin::Op0B(pin) => pin.set_duty_cycle(duty).map_err(|e| e.kind()),
            AnyPwmPin::Op1A(pin) => pin.set_duty_cycle(duty).map_err(|e| e.kind()),
            AnyPwmPin::Op1B(pin) => pin.set_duty_cycle(duty).map_err(|e| e.kind()),
            AnyPwmPin::Op2A(pin) => pin.set_duty_cycle(duty).map_err(|e| e.kind()),
            AnyPwmPin::Op2B(pin) => pin.set_duty_cycle(duty).map_err(|e| e.kind()),
        }
    }
}

/// Starts the three MCPWM timers and hands back the servo bank. `pins` are in
/// channel order, see [`SERVO_PINS`](crate::config::SERVO_PINS).
pub fn servo_bank(
    mcpwm0: MCPWM0<'static>,
    pins: [AnyPin<'static>; 6],
) -> anyhow::Result<ServoBank<AnyPwmPin>> {
    let [base, shoulder, elbow, wrist, roll, gripper] = pins;

    let clock_cfg = PeripheralClockConfig::with_frequency(Rate::from_mhz(PERIPHERAL_CLOCK_MHZ))
        .map_err(|e| anyhow::anyhow!("mcpwm clock: {:?}", e))?;
    let mut mcpwm = McPwm::new(mcpwm0, clock_cfg);

    mcpwm.operator0.set_timer(&mcpwm.timer0);
    mcpwm.operator1.set_timer(&mcpwm.timer1);
    mcpwm.operator2.set_timer(&mcpwm.timer2);

    let (base, shoulder) = mcpwm.operator0.with_pins(
        base,
        PwmPinConfig::UP_ACTIVE_HIGH,
        shoulder,
        PwmPinConfig::UP_ACTIVE_HIGH,
    );
    let (elbow, wrist) = mcpwm.operator1.with_pins(
        elbow,
        PwmPinConfig::UP_ACTIVE_HIGH,
        wrist,
        PwmPinConfig::UP_ACTIVE_HIGH,
    );
    let (roll, gripper) = mcpwm.operator2.with_pins(
        roll,
        PwmPinConfig::UP_ACTIVE_HIGH,
        gripper,
        PwmPinConfig::UP_ACTIVE_HIGH,
    );

    let timer_clock_cfg = clock_cfg
        .timer_clock_with_frequency(
            PERIOD,
            PwmWorkingMode::Increase,
            Rate::from_hz(SERVO_FREQUENCY_HZ),
        )
        .map_err(|e| anyhow::anyhow!("mcpwm timer: {:?}", e))?;
    mcpwm.timer0.start(timer_clock_cfg);
    mcpwm.timer1.start(timer_clock_cfg);
    mcpwm.timer2.start(timer_clock_cfg);

    let servo = |pwm, joint| Servo::new(pwm, SERVO_FREQUENCY_HZ.Hz(), joint);
    Ok(ServoBank::new([
        servo(AnyPwmPin::Op0A(base), Joint::Base),
        servo(AnyPwmPin::Op0B(shoulder), Joint::Shoulder),
        servo(AnyPwmPin::Op1A(elbow), Joint::Elbow),
        servo(AnyPwmPin::Op1B(wrist), Joint::Wrist),
        servo(AnyPwmPin::Op2A(roll), Joint::Roll),
        servo(AnyPwmPin::Op2B(gripper), Joint::Gripper),
    ]))
}
