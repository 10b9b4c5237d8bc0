use fugit::Hertz;
use log::error;

use embedded_hal::pwm::SetDutyCycle;

use crate::config::{CHANNEL_COUNT, MAX_PULSEWIDTH, MIN_PULSEWIDTH, SERVO_PINS};
use crate::robot::joint::Joint;

/// Where a channel's pulse is generated: MCPWM unit, timer and operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmOutput {
    pub unit: u8,
    pub timer: u8,
    pub operator: u8,
}

impl PwmOutput {
    /// Wiring of `joint` on MCPWM unit 0.
    pub fn of(joint: Joint) -> Self {
        let (_, timer, operator) = SERVO_PINS[joint as usize];
        Self {
            unit: 0,
            timer,
            operator,
        }
    }
}

/// Anything that takes one pulse width per channel.
pub trait PwmSink {
    fn export(&mut self, duties: &[u16; CHANNEL_COUNT]);
}

#[derive(Debug)]
pub struct Servo<PWM> {
    pwm: PWM,
    pulse_us: u16,
    max_duty: u32,
    frequency: Hertz<u32>,
    joint_id: Joint,
    output: PwmOutput,
}

impl<PWM> Servo<PWM>
where
    PWM: SetDutyCycle,
{
    pub fn new(pwm: PWM, frequency: Hertz<u32>, joint_id: Joint) -> Self {
        let max_duty = pwm.max_duty_cycle() as u32;
        Self {
            pwm,
            pulse_us: 0,
            max_duty,
            frequency,
            joint_id,
            output: PwmOutput::of(joint_id),
        }
    }

    pub fn pulse_us(&self) -> u16 {
        self.pulse_us
    }

    /// Sets the pulse width in µs, clamped to the servo's safe range.
    pub fn set_pulse_width(&mut self, pulse_us: u16) {
        let pulse_us = pulse_us.clamp(MIN_PULSEWIDTH, MAX_PULSEWIDTH);

        //Avoid rewriting the same pulse
        if self.pulse_us == pulse_us {
            return;
        }
        self.pulse_us = pulse_us;

        // Scale pulse to PWM register resolution
        // e.g. 1500 µs / 20000 µs * 19999 ≈ 1500
        let period_us = 1_000_000 / self.frequency.raw();
        let duty = ((pulse_us as u32 * self.max_duty) / period_us).min(self.max_duty) as u16;
        if let Err(e) = self.pwm.set_duty_cycle(duty) {
            error!(
                "{} (unit {} timer {} operator {}) Error writing pulse {:?}",
                self.joint_id, self.output.unit, self.output.timer, self.output.operator, e
            );
        }
    }
}

/// The six channel servos, exported together once per tick.
pub struct ServoBank<PWM> {
    servos: [Servo<PWM>; CHANNEL_COUNT],
}

impl<PWM: SetDutyCycle> ServoBank<PWM> {
    pub fn new(servos: [Servo<PWM>; CHANNEL_COUNT]) -> Self {
        Self { servos }
    }
}

impl<PWM: SetDutyCycle> PwmSink for ServoBank<PWM> {
    fn export(&mut self, duties: &[u16; CHANNEL_COUNT]) {
        for (servo, &duty) in self.servos.iter_mut().zip(duties) {
            servo.set_pulse_width(duty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::pwm::ErrorType;
    use fugit::RateExtU32;

    struct MockPwm {
        max: u16,
        duty: u16,
        writes: usize,
    }

    impl ErrorType for MockPwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for MockPwm {
        fn max_duty_cycle(&self) -> u16 {
            self.max
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duty = duty;
            self.writes += 1;
            Ok(())
        }
    }

    fn servo(joint: Joint) -> Servo<MockPwm> {
        let pwm = MockPwm {
            max: 20_000,
            duty: 0,
            writes: 0,
        };
        Servo::new(pwm, 50.Hz(), joint)
    }

    #[test]
    fn converts_microseconds_to_duty() {
        let mut s = servo(Joint::Base);
        s.set_pulse_width(1500);
        assert_eq!(s.pwm.duty, 1500);
        s.set_pulse_width(1500);
        assert_eq!(s.pwm.writes, 1);
    }

    #[test]
    fn clamps_out_of_range_pulses() {
        let mut s = servo(Joint::Elbow);
        s.set_pulse_width(100);
        assert_eq!(s.pulse_us(), MIN_PULSEWIDTH);
        s.set_pulse_width(9000);
        assert_eq!(s.pwm.duty, 2500);
    }

    #[test]
    fn bank_drives_every_channel() {
        let mut bank = ServoBank::new(Joint::ALL.map(servo));
        bank.export(&[1000, 1100, 1200, 1300, 1400, 1500]);
        let pulses = bank.servos.each_ref().map(|s| s.pulse_us());
        assert_eq!(pulses, [1000, 1100, 1200, 1300, 1400, 1500]);
    }

    #[test]
    fn outputs_follow_pin_map() {
        assert_eq!(
            PwmOutput::of(Joint::Wrist),
            PwmOutput {
                unit: 0,
                timer: 1,
                operator: 1
            }
        );
    }
}
