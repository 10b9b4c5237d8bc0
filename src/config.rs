//! Physical, timing and protocol constants for the arm.
//!
//! Everything here is compile-time configuration. Values an operator can change at
//! runtime (limits, move durations) are only the *defaults*; the live values sit in
//! the persisted [`ServoHandle`](crate::robot::state::ServoHandle).

/// Number of PWM channels: five joints plus the gripper.
pub const CHANNEL_COUNT: usize = 6;
/// Number of channels driven by the kinematic solver (everything but the gripper).
pub const JOINT_COUNT: usize = 5;
/// Index of the gripper channel.
pub const GRIPPER_CHANNEL: usize = 5;

// --- Servo pulse limits ---
pub const MIN_PULSEWIDTH: u16 = 500; // µs
pub const MAX_PULSEWIDTH: u16 = 2500; // µs
pub const SERVO_FREQUENCY_HZ: u32 = 50;
/// Top of the normalized joint angle range, in degrees.
pub const MAX_NORMALIZED_DEGREE: f32 = 90.0;

/// Pose every channel returns to on `SETHOME` and on a fresh store.
pub const HOME_DUTY: [u16; CHANNEL_COUNT] = [1500; CHANNEL_COUNT];

// --- Control timing ---
pub const CONTROL_INTERVAL_MS: u32 = 20;
/// Default move duration (1 s).
pub const DEFAULT_TIME_FULL: u16 = 50;
/// Default blend duration (200 ms).
pub const DEFAULT_TIME_BALANCE: u16 = 10;
pub const MIN_MOVE_MS: u32 = 500;
pub const MAX_MOVE_MS: u32 = 5000;
/// Persist the handle once a minute.
pub const PERSIST_INTERVAL_TICKS: u32 = 3000;

// --- Queues and buffers ---
pub const EVENT_QUEUE_SIZE: usize = 20;
/// Slots a persistence request must leave free for ticks.
pub const TICK_RESERVE: usize = 4;
pub const RX_BUF_SIZE: usize = 128;
pub const TX_BUF_SIZE: usize = 64;
/// Largest escaped frame for a [`TX_BUF_SIZE`] payload.
pub const MAX_FRAME_SIZE: usize = 2 * TX_BUF_SIZE + 2;
pub const PENDING_FRAMES: usize = 4;
pub const SERIAL_BAUDRATE: u32 = 115_200;
pub const SERIAL_POLL_MS: u64 = 10;

// --- Arm geometry (cm) ---
pub const BASE_OFFSET: f32 = 1.0;
pub const SHOULDER_HEIGHT: f32 = 8.7;
pub const LENGTH_UPPER_ARM: f32 = 10.5;
pub const LENGTH_FOREARM: f32 = 10.0;
/// Base offset plus both arm links, everything but the tool.
pub const FIXED_REACH: f32 = BASE_OFFSET + LENGTH_UPPER_ARM + LENGTH_FOREARM;
/// Elbow may fold down to this many degrees below the upper arm line.
pub const ELBOW_MAX_BEND: f32 = 135.0;
pub const WRIST_MAX_BEND: f32 = 135.0;
pub const DEFAULT_ROLL: f32 = 45.0;
/// Shoulder elevation search, degrees.
pub const SHOULDER_SEARCH_START: f32 = 90.0;
pub const SHOULDER_SEARCH_END: f32 = 0.0;
pub const SHOULDER_SEARCH_STEP: f32 = 1.0;

/// Gripper pulse → opening → wrist-to-tip length, measured on the arm.
/// `(duty µs, width cm, effective length cm)`, sorted by increasing width.
pub const GRIPPER_TABLE: [(u16, f32, f32); 9] = [
    (1900, 0.5, 7.0),
    (1800, 1.3, 6.9),
    (1700, 2.5, 6.7),
    (1600, 3.5, 6.5),
    (1500, 4.4, 6.4),
    (1400, 5.1, 6.3),
    (1300, 5.5, 6.2),
    (1200, 5.9, 6.1),
    (1100, 6.0, 6.0),
];

// --- Default calibration, one entry per joint: (scale, bias, lower µs, upper µs) ---
pub const DEFAULT_CALIBRATION: [(f32, f32, u16, u16); JOINT_COUNT] = [
    (1.0, 45.0, 1000, 2000), // base yaw [-45, 45]
    (-1.0, 90.0, 1000, 2000), // shoulder [0, 90]
    (90.0 / ELBOW_MAX_BEND, 90.0, 1000, 2000), // elbow [-135, 0]
    (90.0 / WRIST_MAX_BEND, 90.0, 1000, 2000), // wrist [-135, 0]
    (1.0, 0.0, 1000, 2000), // roll [0, 90]
];

// --- Persistence ---
pub const STORE_NAMESPACE: &str = "servo";
pub const STORE_KEY: &str = "handle";
/// Validity marker of the persisted record. The low byte is the layout version.
pub const RECORD_MARKER: u32 = 0x5EA4_0003;

/// MCPWM wiring: `(gpio, timer, operator)` per channel, all on unit 0. Operator 0 is
/// the A output of the timer's operator pair, 1 the B output.
pub const SERVO_PINS: [(u8, u8, u8); CHANNEL_COUNT] = [
    (15, 0, 0),
    (13, 0, 1),
    (12, 1, 0),
    (14, 1, 1),
    (27, 2, 0),
    (33, 2, 1),
];
