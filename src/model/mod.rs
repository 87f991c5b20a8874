//! The configuration aggregate owned by the store.

mod channels;
pub mod pins;

pub use channels::{InputChannel, InputKind, MeterChannel, OutputChannel, OutputKind};

/// Wireless association settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WifiConfig {
    /// `"AP"` or `"STA"`.
    pub mode: String,
    /// Network to join, or the access point name.
    pub ssid: String,
    /// Passphrase; redacted in logs.
    pub pass: String,
}

/// Optional hardware modules fitted to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModulesConfig {
    /// ADS1115 converter.
    pub ads1115: bool,
    /// 0-10 V PWM output stage.
    pub pwm010: bool,
    /// ZMPT voltage sensor.
    pub zmpt: bool,
    /// ZMCT current sensor.
    pub zmct: bool,
    /// Resistive divider.
    pub div: bool,
    /// MCP4725 DAC.
    pub mcp4725: bool,
}

impl ModulesConfig {
    /// Flags with their document keys, in document order.
    pub fn flags(&self) -> [(&'static str, bool); 6] {
        [
            ("ads1115", self.ads1115),
            ("pwm010", self.pwm010),
            ("zmpt", self.zmpt),
            ("zmct", self.zmct),
            ("div", self.div),
            ("mcp4725", self.mcp4725),
        ]
    }

    /// Flag for a document key, if the key is known.
    pub fn flag_mut(&mut self, key: &str) -> Option<&mut bool> {
        match key {
            "ads1115" => Some(&mut self.ads1115),
            "pwm010" => Some(&mut self.pwm010),
            "zmpt" => Some(&mut self.zmpt),
            "zmct" => Some(&mut self.zmct),
            "div" => Some(&mut self.div),
            "mcp4725" => Some(&mut self.mcp4725),
            _ => None,
        }
    }
}

/// Credentials of a node this one is allowed to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerCredential {
    /// Peer node id.
    pub node_id: String,
    /// Pairing PIN.
    pub pin: String,
}

/// Full node configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Node identity.
    pub node_id: String,
    /// Wireless settings.
    pub wifi: WifiConfig,
    /// Fitted modules.
    pub modules: ModulesConfig,
    /// Input channels, at most `MAX_INPUTS`.
    pub inputs: Vec<InputChannel>,
    /// Output channels, at most `MAX_OUTPUTS`.
    pub outputs: Vec<OutputChannel>,
    /// Virtual multimeter channels.
    pub meter_channels: Vec<MeterChannel>,
    /// Known peers.
    pub peers: Vec<PeerCredential>,
}

impl Config {
    /// Factory configuration: access point named after the node, nothing enabled.
    pub fn factory(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            wifi: WifiConfig {
                mode: "AP".to_string(),
                ssid: node_id.to_string(),
                pass: String::new(),
            },
            modules: ModulesConfig::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            meter_channels: Vec::new(),
            peers: Vec::new(),
        }
    }

    /// Node id derived from the last four hex digits of a MAC address.
    pub fn node_id_from_mac(mac: &str) -> String {
        let digits: String = mac.chars().filter(char::is_ascii_hexdigit).collect();
        let suffix = &digits[digits.len().saturating_sub(4)..];
        format!("labnode{}", suffix.to_ascii_uppercase())
    }

    /// Input channel by name.
    pub fn input(&self, name: &str) -> Option<&InputChannel> {
        self.inputs.iter().find(|c| c.name == name)
    }

    /// Output channel by name.
    pub fn output(&self, name: &str) -> Option<&OutputChannel> {
        self.outputs.iter().find(|c| c.name == name)
    }

    /// Meter channel by id.
    pub fn meter_channel(&self, id: &str) -> Option<&MeterChannel> {
        self.meter_channels.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_defaults() {
        let config = Config::factory("labnode0001");
        assert_eq!(config.wifi.mode, "AP");
        assert_eq!(config.wifi.ssid, "labnode0001");
        assert!(config.wifi.pass.is_empty());
        assert!(config.modules.flags().iter().all(|(_, on)| !on));
        assert!(config.inputs.is_empty() && config.peers.is_empty());
    }

    #[test]
    fn test_node_id_from_mac() {
        assert_eq!(Config::node_id_from_mac("5C:CF:7F:12:ab:cd"), "labnodeABCD");
        assert_eq!(Config::node_id_from_mac("ab"), "labnodeAB");
    }
}
