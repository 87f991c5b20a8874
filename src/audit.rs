//! Field-level change reports between two configuration snapshots.
//!
//! [`diff`] produces the human-readable lines logged after an IO update.
//! The same per-field comparisons back [`first_mismatch`], which the store
//! uses to label verification failures with a field path.

use std::fmt;

use crate::limits::FLOAT_TOLERANCE;
use crate::model::pins::{format_i2c_address, pin_name};
use crate::model::{Config, InputChannel, MeterChannel, OutputChannel};
use crate::section::ConfigSection;

/// Float comparison used for calibration values.
///
/// Two NaNs are equal, a single NaN differs, otherwise values within the
/// tolerance are equal.
pub fn floats_differ(a: f32, b: f32) -> bool {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => false,
        (true, false) | (false, true) => true,
        _ => (a - b).abs() > FLOAT_TOLERANCE,
    }
}

/// One differing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Wire name of the field.
    pub field: &'static str,
    /// Old value, formatted.
    pub before: String,
    /// New value, formatted.
    pub after: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.before, self.after)
    }
}

/// First field that differs between expected and reloaded state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    /// Dotted path such as `inputs[IN1].scale`.
    pub path: String,
    /// Value the store meant to write.
    pub expected: String,
    /// Value read back from the file.
    pub actual: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.path, self.expected, self.actual)
    }
}

#[derive(Default)]
struct Changes(Vec<FieldChange>);

impl Changes {
    fn text(&mut self, field: &'static str, before: &str, after: &str) {
        if before != after {
            self.push(field, describe_str(before), describe_str(after));
        }
    }

    fn float(&mut self, field: &'static str, before: f32, after: f32) {
        if floats_differ(before, after) {
            self.push(field, describe_float(before), describe_float(after));
        }
    }

    fn value<T: PartialEq + fmt::Display>(&mut self, field: &'static str, before: T, after: T) {
        if before != after {
            self.push(field, before.to_string(), after.to_string());
        }
    }

    fn push(&mut self, field: &'static str, before: String, after: String) {
        self.0.push(FieldChange {
            field,
            before,
            after,
        });
    }
}

fn describe_str(value: &str) -> String {
    if value.is_empty() {
        "(empty)".to_string()
    } else {
        value.to_string()
    }
}

fn describe_float(value: f32) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.4}", value)
    }
}

fn describe_pin(pin: Option<u8>) -> String {
    pin.map_or_else(|| "-".to_string(), pin_name)
}

fn describe_optional<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn describe_optional_float(value: Option<f32>) -> String {
    value.map_or_else(|| "-".to_string(), describe_float)
}

/// Differing fields of two input channels.
pub fn input_changes(before: &InputChannel, after: &InputChannel) -> Vec<FieldChange> {
    let mut c = Changes::default();
    c.value("type", before.kind, after.kind);
    if before.pin != after.pin {
        c.push("pin", describe_pin(before.pin), describe_pin(after.pin));
    }
    if before.ads_channel != after.ads_channel {
        c.push(
            "adsChannel",
            describe_optional(before.ads_channel),
            describe_optional(after.ads_channel),
        );
    }
    c.text("remoteNode", &before.remote_node, &after.remote_node);
    c.text("remoteName", &before.remote_name, &after.remote_name);
    c.float("scale", before.scale, after.scale);
    c.float("offset", before.offset, after.offset);
    c.text("unit", &before.unit, &after.unit);
    c.value("active", before.active, after.active);
    c.0
}

/// Differing fields of two output channels.
pub fn output_changes(before: &OutputChannel, after: &OutputChannel) -> Vec<FieldChange> {
    let mut c = Changes::default();
    c.value("type", before.kind, after.kind);
    if before.pin != after.pin {
        c.push("pin", describe_pin(before.pin), describe_pin(after.pin));
    }
    c.value("pwmFreq", before.pwm_freq, after.pwm_freq);
    if before.i2c_address != after.i2c_address {
        c.push(
            "i2cAddress",
            format_i2c_address(before.i2c_address),
            format_i2c_address(after.i2c_address),
        );
    }
    c.float("scale", before.scale, after.scale);
    c.float("offset", before.offset, after.offset);
    c.value("active", before.active, after.active);
    c.float("value", before.value, after.value);
    c.0
}

/// Differing fields of two meter channels.
pub fn meter_changes(before: &MeterChannel, after: &MeterChannel) -> Vec<FieldChange> {
    let mut c = Changes::default();
    c.text("name", &before.name, &after.name);
    c.text("label", &before.label, &after.label);
    c.text("input", &before.input, &after.input);
    c.text("unit", &before.unit, &after.unit);
    c.text("symbol", &before.symbol, &after.symbol);
    c.value("enabled", before.enabled, after.enabled);
    c.float("scale", before.scale, after.scale);
    c.float("offset", before.offset, after.offset);
    for (field, b, a) in [
        ("rangeMin", before.range_min, after.range_min),
        ("rangeMax", before.range_max, after.range_max),
    ] {
        let differs = match (b, a) {
            (Some(b), Some(a)) => floats_differ(b, a),
            (None, None) => false,
            _ => true,
        };
        if differs {
            c.push(field, describe_optional_float(b), describe_optional_float(a));
        }
    }
    c.value("bits", before.bits, after.bits);
    c.0
}

fn join(changes: &[FieldChange]) -> String {
    changes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Change report over inputs, outputs and meter channels, matched by name/id.
pub fn diff(before: &Config, after: &Config) -> Vec<String> {
    let mut lines = Vec::new();

    for ic in &after.inputs {
        match before.input(&ic.name) {
            None => lines.push(format!(
                "Input added: {} (type={}, pin={}, adsChannel={}, active={})",
                ic.name,
                ic.kind,
                describe_pin(ic.pin),
                describe_optional(ic.ads_channel),
                ic.active
            )),
            Some(prev) => {
                let changes = input_changes(prev, ic);
                if !changes.is_empty() {
                    lines.push(format!("Input updated: {} {{{}}}", ic.name, join(&changes)));
                }
            }
        }
    }
    for prev in &before.inputs {
        if after.input(&prev.name).is_none() {
            lines.push(format!("Input removed: {}", prev.name));
        }
    }

    for oc in &after.outputs {
        match before.output(&oc.name) {
            None => lines.push(format!(
                "Output added: {} (type={}, pin={}, pwm={}, addr={}, active={})",
                oc.name,
                oc.kind,
                describe_pin(oc.pin),
                oc.pwm_freq,
                format_i2c_address(oc.i2c_address),
                oc.active
            )),
            Some(prev) => {
                let changes = output_changes(prev, oc);
                if !changes.is_empty() {
                    lines.push(format!("Output updated: {} {{{}}}", oc.name, join(&changes)));
                }
            }
        }
    }
    for prev in &before.outputs {
        if after.output(&prev.name).is_none() {
            lines.push(format!("Output removed: {}", prev.name));
        }
    }

    for mc in &after.meter_channels {
        match before.meter_channel(&mc.id) {
            None => lines.push(format!(
                "Meter channel added: {} (input={}, unit={}, bits={}, enabled={})",
                mc.id,
                describe_str(&mc.input),
                describe_str(&mc.unit),
                mc.bits,
                mc.enabled
            )),
            Some(prev) => {
                let changes = meter_changes(prev, mc);
                if !changes.is_empty() {
                    lines.push(format!(
                        "Meter channel updated: {} {{{}}}",
                        mc.id,
                        join(&changes)
                    ));
                }
            }
        }
    }
    for prev in &before.meter_channels {
        if after.meter_channel(&prev.id).is_none() {
            lines.push(format!("Meter channel removed: {}", prev.id));
        }
    }

    lines
}

fn mismatch(path: String, expected: impl ToString, actual: impl ToString) -> Option<FieldMismatch> {
    Some(FieldMismatch {
        path,
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

/// Compare the channel lists positionally, then field by field.
fn list_mismatch<T>(
    label: &str,
    expected: &[T],
    actual: &[T],
    key: impl Fn(&T) -> &str,
    changes: impl Fn(&T, &T) -> Vec<FieldChange>,
) -> Option<FieldMismatch> {
    if expected.len() != actual.len() {
        return mismatch(format!("{}.length", label), expected.len(), actual.len());
    }
    for (index, (e, a)) in expected.iter().zip(actual).enumerate() {
        if key(e) != key(a) {
            return mismatch(format!("{}[{}]", label, index), key(e), key(a));
        }
        if let Some(change) = changes(e, a).into_iter().next() {
            return mismatch(
                format!("{}[{}].{}", label, key(e), change.field),
                change.before,
                change.after,
            );
        }
    }
    None
}

/// First difference between `expected` and `actual` within `sections`.
pub fn first_mismatch(
    expected: &Config,
    actual: &Config,
    sections: ConfigSection,
) -> Option<FieldMismatch> {
    if sections.contains(ConfigSection::INTERFACE) {
        let pairs = [
            ("nodeId", &expected.node_id, &actual.node_id),
            ("wifi.mode", &expected.wifi.mode, &actual.wifi.mode),
            ("wifi.ssid", &expected.wifi.ssid, &actual.wifi.ssid),
            ("wifi.pass", &expected.wifi.pass, &actual.wifi.pass),
        ];
        for (path, e, a) in pairs {
            if e != a {
                // Never echo the password itself.
                return if path == "wifi.pass" {
                    mismatch(path.to_string(), "***", "***")
                } else {
                    mismatch(path.to_string(), describe_str(e), describe_str(a))
                };
            }
        }
    }

    if sections.contains(ConfigSection::MODULES) {
        let expected_flags = expected.modules.flags();
        let actual_flags = actual.modules.flags();
        for ((key, e), (_, a)) in expected_flags.iter().zip(actual_flags.iter()) {
            if e != a {
                return mismatch(format!("modules.{}", key), e, a);
            }
        }
    }

    if sections.contains(ConfigSection::IO) {
        let found = list_mismatch(
            "inputs",
            &expected.inputs,
            &actual.inputs,
            |c| c.name.as_str(),
            input_changes,
        )
        .or_else(|| {
            list_mismatch(
                "outputs",
                &expected.outputs,
                &actual.outputs,
                |c| c.name.as_str(),
                output_changes,
            )
        });
        if found.is_some() {
            return found;
        }
    }

    if sections.contains(ConfigSection::VIRTUAL) {
        let found = list_mismatch(
            "meterChannels",
            &expected.meter_channels,
            &actual.meter_channels,
            |c| c.id.as_str(),
            meter_changes,
        );
        if found.is_some() {
            return found;
        }
    }

    if sections.contains(ConfigSection::PEERS) {
        if expected.peers.len() != actual.peers.len() {
            return mismatch(
                "peers.length".to_string(),
                expected.peers.len(),
                actual.peers.len(),
            );
        }
        for (index, (e, a)) in expected.peers.iter().zip(&actual.peers).enumerate() {
            if e.node_id != a.node_id {
                return mismatch(format!("peers[{}].nodeId", index), &e.node_id, &a.node_id);
            }
            if e.pin != a.pin {
                return mismatch(format!("peers[{}].pin", index), &e.pin, &a.pin);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InputKind, OutputKind, PeerCredential};

    fn with_inputs(inputs: Vec<InputChannel>) -> Config {
        let mut config = Config::factory("n");
        config.inputs = inputs;
        config
    }

    #[test]
    fn test_floats_differ() {
        assert!(!floats_differ(f32::NAN, f32::NAN));
        assert!(floats_differ(f32::NAN, 1.0));
        assert!(floats_differ(0.0, f32::NAN));
        assert!(!floats_differ(1.0, 1.00005));
        assert!(floats_differ(1.0, 1.001));
    }

    #[test]
    fn test_diff_added_removed_updated() {
        let mut in1 = InputChannel::slot(0);
        in1.kind = InputKind::Adc;
        in1.pin = Some(17);
        in1.active = true;
        let before = with_inputs(vec![in1.clone(), InputChannel::slot(1)]);

        let mut changed = in1;
        changed.scale = 2.0;
        changed.unit = "mV".into();
        let mut in3 = InputChannel::slot(2);
        in3.kind = InputKind::Ads1115;
        in3.ads_channel = Some(1);
        in3.active = true;
        let after = with_inputs(vec![changed, in3]);

        let lines = diff(&before, &after);
        assert_eq!(
            lines,
            vec![
                "Input updated: IN1 {scale: 1.0000 -> 2.0000, unit: (empty) -> mV}".to_string(),
                "Input added: IN3 (type=ads1115, pin=-, adsChannel=1, active=true)".to_string(),
                "Input removed: IN2".to_string(),
            ]
        );
    }

    #[test]
    fn test_diff_ignores_round_trip_noise() {
        let mut out = OutputChannel::slot(0);
        out.kind = OutputKind::Mcp4725;
        out.value = 1.1;
        let mut before = Config::factory("n");
        before.outputs.push(out.clone());
        let mut after = before.clone();
        after.outputs[0].value = 1.100_01;
        assert!(diff(&before, &after).is_empty());

        after.outputs[0].i2c_address = 0x61;
        assert_eq!(
            diff(&before, &after),
            vec!["Output updated: OUT1 {i2cAddress: 0x60 -> 0x61}".to_string()]
        );
    }

    #[test]
    fn test_meter_channel_lines() {
        let mut before = Config::factory("n");
        before.meter_channels.push(MeterChannel {
            id: "m1".into(),
            ..MeterChannel::default()
        });
        let mut after = before.clone();
        after.meter_channels[0].range_max = Some(5.0);
        assert_eq!(
            diff(&before, &after),
            vec!["Meter channel updated: m1 {rangeMax: - -> 5.0000}".to_string()]
        );
    }

    #[test]
    fn test_first_mismatch_paths() {
        let expected = with_inputs(vec![InputChannel::slot(0)]);
        let mut actual = expected.clone();
        assert_eq!(first_mismatch(&expected, &actual, ConfigSection::ALL), None);

        actual.inputs[0].scale = 3.0;
        let found = first_mismatch(&expected, &actual, ConfigSection::IO).unwrap();
        assert_eq!(found.path, "inputs[IN1].scale");
        assert_eq!(found.to_string(), "inputs[IN1].scale: 1.0000 -> 3.0000");

        // Outside the compared sections nothing is reported.
        assert_eq!(first_mismatch(&expected, &actual, ConfigSection::PEERS), None);

        let mut peers = expected.clone();
        peers.peers = vec![PeerCredential::default(); 3];
        let mut other = peers.clone();
        other.peers[2].pin = "77".into();
        let found = first_mismatch(&peers, &other, ConfigSection::PEERS).unwrap();
        assert_eq!(found.path, "peers[2].pin");
    }

    #[test]
    fn test_first_mismatch_masks_password() {
        let expected = Config::factory("n");
        let mut actual = expected.clone();
        actual.wifi.pass = "secret".into();
        let found = first_mismatch(&expected, &actual, ConfigSection::INTERFACE).unwrap();
        assert_eq!(found.to_string(), "wifi.pass: *** -> ***");
    }
}
