//! Shared hard limits for channel collections and document buffers.

/// Maximum number of input channels kept in a configuration.
pub const MAX_INPUTS: usize = 4;
/// Maximum number of output channels kept in a configuration.
pub const MAX_OUTPUTS: usize = 2;
/// Maximum number of virtual multimeter channels.
pub const MAX_METER_CHANNELS: usize = 6;
/// Maximum number of stored peer credentials.
pub const MAX_PEERS: usize = 16;

/// Smallest document buffer ever allocated.
pub const MIN_DOCUMENT_CAPACITY: usize = 1024;
/// Headroom added on top of the payload size for small payloads.
pub const DOCUMENT_SAFETY_MARGIN: usize = 512;
/// Hard ceiling for any document buffer.
pub const MAX_DOCUMENT_CAPACITY: usize = 28 * 1024;
/// Minimum step used when growing a buffer after an overflow.
pub const DOCUMENT_GROW_INCREMENT: usize = 1024;

/// Nesting depth accepted for channel lists encoded as strings.
pub const MAX_NESTED_CONTAINER_DEPTH: usize = 3;

/// Valid ADS1115 multiplexer channels.
pub const ADS_CHANNEL_RANGE: std::ops::RangeInclusive<i32> = 0..=3;
/// Largest 7-bit I2C address.
pub const MAX_I2C_ADDRESS: u8 = 0x7F;
/// Address used when an output omits or garbles its I2C address.
pub const DEFAULT_I2C_ADDRESS: u8 = 0x60;
/// Default PWM carrier frequency in Hz.
pub const DEFAULT_PWM_FREQ: i32 = 2000;
/// Default resolution of a meter channel.
pub const DEFAULT_METER_BITS: u8 = 10;
/// Accepted meter resolution range.
pub const METER_BITS_RANGE: std::ops::RangeInclusive<i64> = 1..=32;

/// Tolerance used when comparing calibration values.
pub const FLOAT_TOLERANCE: f32 = 1e-4;
