//! Input, output and virtual meter channel definitions.

use std::fmt;

use crate::limits::{DEFAULT_I2C_ADDRESS, DEFAULT_METER_BITS, DEFAULT_PWM_FREQ};

/// Hardware source of an input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputKind {
    /// Slot unused.
    #[default]
    Disabled,
    /// On-chip ADC pin.
    Adc,
    /// External ADS1115 converter channel.
    Ads1115,
    /// Value published by a peer node.
    Remote,
    /// ZMPT voltage transformer on an analog pin.
    Zmpt,
    /// ZMCT current transformer on an analog pin.
    Zmct,
    /// Resistive divider on an analog pin.
    Div,
}

impl InputKind {
    /// Parse a type string. Unknown strings map to `None`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "disabled" | "" => Some(Self::Disabled),
            "adc" => Some(Self::Adc),
            "ads1115" => Some(Self::Ads1115),
            "remote" => Some(Self::Remote),
            "zmpt" => Some(Self::Zmpt),
            "zmct" => Some(Self::Zmct),
            "div" => Some(Self::Div),
            _ => None,
        }
    }

    /// Document form of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Adc => "adc",
            Self::Ads1115 => "ads1115",
            Self::Remote => "remote",
            Self::Zmpt => "zmpt",
            Self::Zmct => "zmct",
            Self::Div => "div",
        }
    }

    /// Kinds that read an analog pin directly.
    pub fn needs_pin(self) -> bool {
        matches!(self, Self::Adc | Self::Zmpt | Self::Zmct | Self::Div)
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver of an output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputKind {
    /// Slot unused.
    #[default]
    Disabled,
    /// 0-10 V through a filtered PWM pin.
    Pwm010,
    /// Plain digital pin.
    Gpio,
    /// MCP4725 DAC on the I2C bus.
    Mcp4725,
}

impl OutputKind {
    /// Parse a type string. Unknown strings map to `None`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "disabled" | "" => Some(Self::Disabled),
            "pwm010" => Some(Self::Pwm010),
            "gpio" => Some(Self::Gpio),
            "mcp4725" => Some(Self::Mcp4725),
            _ => None,
        }
    }

    /// Document form of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Pwm010 => "pwm010",
            Self::Gpio => "gpio",
            Self::Mcp4725 => "mcp4725",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One measured input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputChannel {
    /// Unique channel name.
    pub name: String,
    /// Hardware source.
    pub kind: InputKind,
    /// GPIO number for pin-based kinds.
    pub pin: Option<u8>,
    /// ADS1115 channel, 0 to 3.
    pub ads_channel: Option<i32>,
    /// Peer publishing a remote value.
    pub remote_node: String,
    /// Channel name on that peer.
    pub remote_name: String,
    /// Calibration gain.
    pub scale: f32,
    /// Calibration offset, applied after `scale`.
    pub offset: f32,
    /// Display unit.
    pub unit: String,
    /// Sampled by the acquisition loop.
    pub active: bool,
}

impl InputChannel {
    /// Empty slot named after its 1-based position.
    pub fn slot(index: usize) -> Self {
        Self {
            name: format!("IN{}", index + 1),
            kind: InputKind::Disabled,
            pin: None,
            ads_channel: None,
            remote_node: String::new(),
            remote_name: String::new(),
            scale: 1.0,
            offset: 0.0,
            unit: String::new(),
            active: false,
        }
    }
}

/// One driven output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputChannel {
    /// Unique channel name.
    pub name: String,
    /// Output driver.
    pub kind: OutputKind,
    /// GPIO number for pin-based kinds.
    pub pin: Option<u8>,
    /// PWM frequency in Hz.
    pub pwm_freq: i32,
    /// 7-bit bus address for DAC outputs.
    pub i2c_address: u8,
    /// Calibration gain.
    pub scale: f32,
    /// Calibration offset.
    pub offset: f32,
    /// Driven by the control loop.
    pub active: bool,
    /// Last commanded value.
    pub value: f32,
}

impl OutputChannel {
    /// Empty slot named after its 1-based position.
    pub fn slot(index: usize) -> Self {
        Self {
            name: format!("OUT{}", index + 1),
            kind: OutputKind::Disabled,
            pin: None,
            pwm_freq: DEFAULT_PWM_FREQ,
            i2c_address: DEFAULT_I2C_ADDRESS,
            scale: 1.0,
            offset: 0.0,
            active: false,
            value: 0.0,
        }
    }
}

/// One display channel of the virtual multimeter.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterChannel {
    /// Unique channel id.
    pub id: String,
    /// Display name, defaults to the id.
    pub name: String,
    /// Short label, defaults to the name.
    pub label: String,
    /// Name of the input channel feeding this meter.
    pub input: String,
    /// Unit name.
    pub unit: String,
    /// Unit symbol shown on the display.
    pub symbol: String,
    /// Shown on the display.
    pub enabled: bool,
    /// Display gain.
    pub scale: f32,
    /// Display offset.
    pub offset: f32,
    /// Lower end of the display range, if fixed.
    pub range_min: Option<f32>,
    /// Upper end of the display range, if fixed.
    pub range_max: Option<f32>,
    /// Display resolution, 1 to 32.
    pub bits: u8,
}

impl Default for MeterChannel {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            label: String::new(),
            input: String::new(),
            unit: String::new(),
            symbol: String::new(),
            enabled: true,
            scale: 1.0,
            offset: 0.0,
            range_min: None,
            range_max: None,
            bits: DEFAULT_METER_BITS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_normalized() {
        assert_eq!(InputKind::parse(" ADS1115 "), Some(InputKind::Ads1115));
        assert_eq!(InputKind::parse("Remote"), Some(InputKind::Remote));
        assert_eq!(InputKind::parse("thermo"), None);
        assert_eq!(OutputKind::parse("PWM010"), Some(OutputKind::Pwm010));
        assert_eq!(OutputKind::parse("servo"), None);
    }

    #[test]
    fn test_slot_defaults() {
        let input = InputChannel::slot(0);
        assert_eq!(input.name, "IN1");
        assert_eq!(input.scale, 1.0);
        assert!(!input.active);

        let output = OutputChannel::slot(1);
        assert_eq!(output.name, "OUT2");
        assert_eq!(output.pwm_freq, 2000);
        assert_eq!(output.i2c_address, 0x60);

        let meter = MeterChannel::default();
        assert!(meter.enabled);
        assert_eq!(meter.bits, 10);
    }
}
