use crate::document::Node;
use crate::error::{StoreError, StoreResult};
use crate::limits::{
    ADS_CHANNEL_RANGE, MAX_INPUTS, MAX_METER_CHANNELS, MAX_NESTED_CONTAINER_DEPTH, MAX_OUTPUTS,
    MAX_PEERS, METER_BITS_RANGE,
};
use crate::model::pins::{parse_i2c_address, parse_pin};
use crate::model::{
    Config, InputChannel, InputKind, MeterChannel, OutputChannel, OutputKind, PeerCredential,
};
use crate::section::ConfigSection;

use super::Diagnostics;

/// Parser used for channel lists that arrive as encoded strings.
pub(super) type NestedParser<'a> = dyn Fn(&str) -> StoreResult<Node> + 'a;

/// Overwrite the requested sections of `target` from `root`.
///
/// Returns the requested sections the document actually carried.
pub(super) fn apply(
    root: &Node,
    sections: ConfigSection,
    target: &mut Config,
    diags: &mut Diagnostics,
    nested: &NestedParser<'_>,
) -> StoreResult<ConfigSection> {
    // A bare array can only be a virtual channel list.
    if let Node::Array(_) = root {
        if sections.contains(ConfigSection::VIRTUAL) {
            target.meter_channels = meter_channels(root, diags, nested)?;
            return Ok(ConfigSection::VIRTUAL);
        }
        return Err(StoreError::decode(sections, "document root must be an object"));
    }
    if root.as_object().is_none() {
        return Err(StoreError::decode(sections, "document root must be an object"));
    }

    let mut present = ConfigSection::empty();

    if sections.contains(ConfigSection::INTERFACE) && interface(root, target, diags)? {
        present |= ConfigSection::INTERFACE;
    }
    if sections.contains(ConfigSection::MODULES) && modules(root, target, diags)? {
        present |= ConfigSection::MODULES;
    }
    if sections.contains(ConfigSection::IO) {
        if root.contains_key("inputs") || root.contains_key("outputs") {
            present |= ConfigSection::IO;
        }
        target.inputs = match root.get("inputs") {
            Some(node) if !node.is_null() => inputs(node, diags, nested)?,
            _ => {
                diags.report("Configuration missing 'inputs'; no inputs configured");
                Vec::new()
            }
        };
        target.outputs = match root.get("outputs") {
            Some(node) if !node.is_null() => outputs(node, diags, nested)?,
            _ => {
                diags.report("Configuration missing 'outputs'; no outputs configured");
                Vec::new()
            }
        };
    }
    if sections.contains(ConfigSection::VIRTUAL) {
        // Older virtual files carry the channel list at the root.
        let body = root
            .get("virtualMultimeter")
            .or_else(|| root.get("channels").map(|_| root));
        if let Some(body) = body {
            present |= ConfigSection::VIRTUAL;
            target.meter_channels = meter_channels(body, diags, nested)?;
        }
    }
    if sections.contains(ConfigSection::PEERS) {
        if root.contains_key("peers") {
            present |= ConfigSection::PEERS;
        }
        target.peers = match root.get("peers") {
            Some(node) if !node.is_null() => peers(node, diags)?,
            _ => Vec::new(),
        };
    }

    Ok(present)
}

fn interface(root: &Node, target: &mut Config, diags: &mut Diagnostics) -> StoreResult<bool> {
    let mut seen = false;
    if let Some(node) = root.get("nodeId") {
        seen = true;
        let id = scalar_text(node, ConfigSection::INTERFACE, "nodeId")?;
        if id.is_empty() {
            diags.report(format!(
                "Empty 'nodeId' ignored; keeping {}",
                target.node_id
            ));
        } else {
            target.node_id = id;
        }
    }
    if let Some(wifi) = root.get("wifi") {
        seen = true;
        match wifi {
            Node::Null => {}
            Node::Object(_) => {
                for (key, slot) in [
                    ("mode", &mut target.wifi.mode),
                    ("ssid", &mut target.wifi.ssid),
                    ("pass", &mut target.wifi.pass),
                ] {
                    if let Some(value) = wifi.get(key) {
                        *slot = scalar_text(value, ConfigSection::INTERFACE, key)?;
                    }
                }
            }
            other => {
                return Err(StoreError::decode(
                    ConfigSection::INTERFACE,
                    format!("'wifi' must be an object, found {}", other.type_name()),
                ));
            }
        }
    }
    Ok(seen)
}

fn modules(root: &Node, target: &mut Config, diags: &mut Diagnostics) -> StoreResult<bool> {
    let Some(node) = root.get("modules") else {
        return Ok(false);
    };
    match node {
        Node::Null => {}
        Node::Object(entries) => {
            for (key, value) in entries {
                let Some(flag) = target.modules.flag_mut(key) else {
                    diags.report(format!("Unknown module '{}' ignored", key));
                    continue;
                };
                match as_flag(value) {
                    Some(on) => *flag = on,
                    None => diags.report(format!(
                        "Module '{}' has non-boolean value ({}); keeping {}",
                        key,
                        value.type_name(),
                        flag
                    )),
                }
            }
        }
        other => {
            return Err(StoreError::decode(
                ConfigSection::MODULES,
                format!("'modules' must be an object, found {}", other.type_name()),
            ));
        }
    }
    Ok(true)
}

/// One entry of a channel container and the map key it was stored under.
struct Entry {
    key: Option<String>,
    node: Node,
}

/// Flatten an array, an object of objects or an encoded string into entries.
fn container(
    node: &Node,
    label: &str,
    section: ConfigSection,
    nested: &NestedParser<'_>,
    diags: &mut Diagnostics,
) -> StoreResult<Vec<Entry>> {
    let mut current = node.clone();
    for _ in 0..=MAX_NESTED_CONTAINER_DEPTH {
        match current {
            Node::Array(items) => {
                return Ok(items.into_iter().map(|node| Entry { key: None, node }).collect());
            }
            Node::Object(entries) => {
                return Ok(entries
                    .into_iter()
                    .map(|(key, node)| Entry { key: Some(key), node })
                    .collect());
            }
            Node::Null => return Ok(Vec::new()),
            Node::String(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    diags.report(format!("'{}' is an empty string; treating as empty", label));
                    return Ok(Vec::new());
                }
                current = nested(trimmed).map_err(|e| {
                    StoreError::decode(
                        section,
                        format!("'{}' string is not a container: {}", label, e.detail()),
                    )
                })?;
            }
            other => {
                return Err(StoreError::decode(
                    section,
                    format!(
                        "'{}' must be an array or object, found {}",
                        label,
                        other.type_name()
                    ),
                ));
            }
        }
    }
    Err(StoreError::decode(
        section,
        format!(
            "'{}' nests encoded strings deeper than {} levels",
            label, MAX_NESTED_CONTAINER_DEPTH
        ),
    ))
}

/// Map keys starting with `#` are positional, not names.
fn key_as_name(key: &Option<String>) -> Option<&str> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty() && !k.starts_with('#'))
}

fn inputs(
    node: &Node,
    diags: &mut Diagnostics,
    nested: &NestedParser<'_>,
) -> StoreResult<Vec<InputChannel>> {
    let entries = container(node, "inputs", ConfigSection::IO, nested, diags)?;
    let mut out: Vec<InputChannel> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let tag = entry.key.clone().unwrap_or_else(|| format!("#{}", index));
        if entry.node.as_object().is_none() {
            diags.report(format!(
                "Input entry {} is not an object ({}); skipping",
                tag,
                entry.node.type_name()
            ));
            continue;
        }
        if out.len() >= MAX_INPUTS {
            diags.report(format!(
                "Input entry {} dropped: only {} inputs are supported",
                tag, MAX_INPUTS
            ));
            continue;
        }
        let channel = input(&entry.node, key_as_name(&entry.key), out.len(), diags);
        if out.iter().any(|c| c.name == channel.name) {
            diags.report(format!("Duplicate input name '{}' rejected", channel.name));
            continue;
        }
        out.push(channel);
    }
    Ok(out)
}

fn input(
    obj: &Node,
    key: Option<&str>,
    slot: usize,
    diags: &mut Diagnostics,
) -> InputChannel {
    let mut ch = InputChannel::slot(slot);
    ch.name = channel_name(obj, key, &ch.name, "Input", diags);

    ch.kind = match obj.get("type").map(Node::to_text) {
        Some(text) => InputKind::parse(&text).unwrap_or_else(|| {
            diags.report(format!(
                "Input {} has unsupported type '{}', defaulting to disabled",
                ch.name,
                text.trim()
            ));
            InputKind::Disabled
        }),
        None => {
            diags.report(format!("Input {} missing type, defaulting to disabled", ch.name));
            InputKind::Disabled
        }
    };

    match obj.get("pin") {
        Some(node) => ch.pin = pin(node, "Input", &ch.name, diags),
        None if ch.kind == InputKind::Adc => {
            ch.pin = parse_pin("A0");
            diags.report(format!("Input {} missing pin for ADC type, defaulting to A0", ch.name));
        }
        None if ch.kind.needs_pin() => {
            diags.report(format!("Input {} missing pin for {} sensor", ch.name, ch.kind));
        }
        None => {}
    }

    match obj.get("adsChannel") {
        Some(Node::Null) | None => {
            if ch.kind == InputKind::Ads1115 {
                diags.report(format!("Input {} missing 'adsChannel' for ADS1115", ch.name));
            }
        }
        Some(node) => match as_int(node) {
            Some(value) => {
                let value = value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
                if !ADS_CHANNEL_RANGE.contains(&value) {
                    diags.report(format!(
                        "Input {} has out-of-range adsChannel {} (expected 0-3)",
                        ch.name, value
                    ));
                }
                ch.ads_channel = Some(value);
            }
            None => diags.report(format!(
                "Input {} has non-numeric adsChannel '{}'",
                ch.name,
                node.to_text()
            )),
        },
    }

    ch.remote_node = trimmed(obj, "remoteNode");
    ch.remote_name = trimmed(obj, "remoteName");
    if ch.kind == InputKind::Remote {
        if ch.remote_node.is_empty() {
            diags.report(format!("Input {} of type remote missing 'remoteNode'", ch.name));
        }
        if ch.remote_name.is_empty() {
            ch.remote_name = ch.name.clone();
            diags.report(format!(
                "Input {} of type remote missing 'remoteName', using {}",
                ch.name, ch.name
            ));
        }
    }

    let label = format!("Input {}", ch.name);
    ch.scale = float_or(obj, "scale", 1.0, &label, diags);
    ch.offset = float_or(obj, "offset", 0.0, &label, diags);
    ch.unit = trimmed(obj, "unit");
    ch.active = active(obj, ch.kind != InputKind::Disabled, "Input", &ch.name, diags);
    ch
}

fn outputs(
    node: &Node,
    diags: &mut Diagnostics,
    nested: &NestedParser<'_>,
) -> StoreResult<Vec<OutputChannel>> {
    let entries = container(node, "outputs", ConfigSection::IO, nested, diags)?;
    let mut out: Vec<OutputChannel> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let tag = entry.key.clone().unwrap_or_else(|| format!("#{}", index));
        if entry.node.as_object().is_none() {
            diags.report(format!(
                "Output entry {} is not an object ({}); skipping",
                tag,
                entry.node.type_name()
            ));
            continue;
        }
        if out.len() >= MAX_OUTPUTS {
            diags.report(format!(
                "Output entry {} dropped: only {} outputs are supported",
                tag, MAX_OUTPUTS
            ));
            continue;
        }
        let channel = output(&entry.node, key_as_name(&entry.key), out.len(), diags);
        if out.iter().any(|c| c.name == channel.name) {
            diags.report(format!("Duplicate output name '{}' rejected", channel.name));
            continue;
        }
        out.push(channel);
    }
    Ok(out)
}

fn output(
    obj: &Node,
    key: Option<&str>,
    slot: usize,
    diags: &mut Diagnostics,
) -> OutputChannel {
    let mut ch = OutputChannel::slot(slot);
    ch.name = channel_name(obj, key, &ch.name, "Output", diags);

    ch.kind = match obj.get("type").map(Node::to_text) {
        Some(text) => OutputKind::parse(&text).unwrap_or_else(|| {
            diags.report(format!(
                "Output {} has unsupported type '{}', defaulting to disabled",
                ch.name,
                text.trim()
            ));
            OutputKind::Disabled
        }),
        None => {
            diags.report(format!("Output {} missing type, defaulting to disabled", ch.name));
            OutputKind::Disabled
        }
    };

    match obj.get("pin") {
        Some(node) => ch.pin = pin(node, "Output", &ch.name, diags),
        None if matches!(ch.kind, OutputKind::Pwm010 | OutputKind::Gpio) => {
            diags.report(format!("Output {} missing pin for {}", ch.name, ch.kind));
        }
        None => {}
    }

    if let Some(node) = obj.get("pwmFreq") {
        match as_int(node) {
            Some(freq) => {
                let clamped = freq.clamp(0, i64::from(i32::MAX));
                if clamped != freq {
                    diags.report(format!(
                        "Output {} pwmFreq {} out of range; using {}",
                        ch.name, freq, clamped
                    ));
                }
                ch.pwm_freq = clamped as i32;
            }
            None => diags.report(format!(
                "Output {} has non-numeric pwmFreq; keeping {}",
                ch.name, ch.pwm_freq
            )),
        }
    }

    match obj.get("i2cAddress") {
        Some(node @ (Node::String(_) | Node::Number(_))) => {
            ch.i2c_address = parse_i2c_address(&node.to_text());
        }
        Some(node) => diags.report(format!(
            "Output {} has invalid i2cAddress ({})",
            ch.name,
            node.type_name()
        )),
        None if ch.kind == OutputKind::Mcp4725 => {
            diags.report(format!("Output {} missing i2cAddress for MCP4725", ch.name));
        }
        None => {}
    }

    let label = format!("Output {}", ch.name);
    ch.scale = float_or(obj, "scale", 1.0, &label, diags);
    ch.offset = float_or(obj, "offset", 0.0, &label, diags);
    ch.active = active(obj, ch.kind != OutputKind::Disabled, "Output", &ch.name, diags);
    ch.value = float_or(obj, "value", ch.value, &label, diags);
    ch
}

fn meter_channels(
    body: &Node,
    diags: &mut Diagnostics,
    nested: &NestedParser<'_>,
) -> StoreResult<Vec<MeterChannel>> {
    let list = match body {
        Node::Null => return Ok(Vec::new()),
        Node::Object(_) => match body.get("channels") {
            Some(channels) => channels,
            None => return Ok(Vec::new()),
        },
        Node::Array(_) => body,
        other => {
            return Err(StoreError::decode(
                ConfigSection::VIRTUAL,
                format!(
                    "'virtualMultimeter' must be an array or object, found {}",
                    other.type_name()
                ),
            ));
        }
    };

    let entries = container(list, "channels", ConfigSection::VIRTUAL, nested, diags)?;
    let mut out: Vec<MeterChannel> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        if entry.node.as_object().is_none() {
            diags.report(format!(
                "Meter channel entry {} is not an object ({}); skipping",
                index,
                entry.node.type_name()
            ));
            continue;
        }
        if out.len() >= MAX_METER_CHANNELS {
            diags.report(format!(
                "Meter channel entry {} dropped: only {} channels are supported",
                index, MAX_METER_CHANNELS
            ));
            continue;
        }
        let channel = meter_channel(&entry.node, entry.key.as_deref(), index, diags);
        if out.iter().any(|c| c.id == channel.id) {
            diags.report(format!("Duplicate meter channel id '{}' rejected", channel.id));
            continue;
        }
        out.push(channel);
    }
    Ok(out)
}

fn meter_channel(
    obj: &Node,
    key: Option<&str>,
    index: usize,
    diags: &mut Diagnostics,
) -> MeterChannel {
    let mut mc = MeterChannel {
        id: trimmed(obj, "id"),
        ..MeterChannel::default()
    };
    if mc.id.is_empty() {
        mc.id = match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => key.to_string(),
            None => format!("meter{}", index + 1),
        };
    }
    mc.name = non_empty_or(trimmed(obj, "name"), &mc.id);
    mc.label = non_empty_or(trimmed(obj, "label"), &mc.name);
    mc.input = trimmed(obj, "input");
    mc.unit = trimmed(obj, "unit");
    mc.symbol = trimmed(obj, "symbol");

    let label = format!("Meter channel {}", mc.id);
    if let Some(node) = obj.get("enabled") {
        mc.enabled = as_flag(node).unwrap_or_else(|| {
            diags.report(format!(
                "{} has unparseable 'enabled' ({}); using false",
                label,
                raw_text(node)
            ));
            false
        });
    }
    mc.scale = float_or(obj, "scale", 1.0, &label, diags);
    mc.offset = float_or(obj, "offset", 0.0, &label, diags);
    mc.range_min = optional_float(obj, "rangeMin", &label, diags);
    mc.range_max = optional_float(obj, "rangeMax", &label, diags);

    if let Some(node) = obj.get("bits") {
        let (min, max) = (*METER_BITS_RANGE.start(), *METER_BITS_RANGE.end());
        match as_int(node) {
            Some(bits) => {
                let clamped = bits.clamp(min, max);
                if clamped != bits {
                    diags.report(format!("{} bits {} clamped to {}", label, bits, clamped));
                }
                mc.bits = clamped as u8;
            }
            None => {
                diags.report(format!(
                    "{} has non-numeric 'bits' ({}); using {}",
                    label,
                    raw_text(node),
                    min
                ));
                mc.bits = min as u8;
            }
        }
    }
    mc
}

fn peers(node: &Node, diags: &mut Diagnostics) -> StoreResult<Vec<PeerCredential>> {
    let entries: Vec<(Option<&str>, &Node)> = match node {
        Node::Array(items) => items.iter().map(|n| (None, n)).collect(),
        Node::Object(map) => map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect(),
        other => {
            return Err(StoreError::decode(
                ConfigSection::PEERS,
                format!("'peers' must be an array or object, found {}", other.type_name()),
            ));
        }
    };
    if entries.len() > MAX_PEERS {
        diags.report(format!(
            "Configuration provides {} peers but only {} are supported; ignoring extras",
            entries.len(),
            MAX_PEERS
        ));
    }

    let mut out = Vec::new();
    for (index, (key, entry)) in entries.into_iter().take(MAX_PEERS).enumerate() {
        let tag = key.map_or_else(|| index.to_string(), |k| format!("'{}'", k));
        let peer = match entry {
            Node::Object(_) => PeerCredential {
                node_id: match entry.get("nodeId") {
                    Some(id) => id.to_text().trim().to_string(),
                    None => key.unwrap_or_default().trim().to_string(),
                },
                pin: entry.get("pin").map(Node::to_text).unwrap_or_default(),
            },
            // Map form may carry the pin directly: {"labnode0002": "1234"}.
            Node::String(_) | Node::Number(_) if key.is_some() => PeerCredential {
                node_id: key.unwrap_or_default().trim().to_string(),
                pin: entry.to_text(),
            },
            other => {
                diags.report(format!(
                    "Peer entry {} is not an object ({}); skipping",
                    tag,
                    other.type_name()
                ));
                continue;
            }
        };
        if peer.node_id.is_empty() {
            diags.report(format!("Peer entry {} missing nodeId", tag));
        }
        if peer.pin.is_empty() {
            diags.report(format!("Peer entry {} missing pin", tag));
        }
        out.push(peer);
    }
    Ok(out)
}

fn channel_name(
    obj: &Node,
    key: Option<&str>,
    fallback: &str,
    what: &str,
    diags: &mut Diagnostics,
) -> String {
    if let Some(node) = obj.get("name") {
        let provided = node.to_text().trim().to_string();
        if provided.is_empty() {
            diags.report(format!("{} provided empty name; using {}", what, fallback));
            return fallback.to_string();
        }
        return provided;
    }
    match key {
        Some(key) => {
            diags.report(format!("{} missing 'name', using map key '{}'", what, key));
            key.to_string()
        }
        None => {
            diags.report(format!("{} missing 'name', using default {}", what, fallback));
            fallback.to_string()
        }
    }
}

fn pin(node: &Node, what: &str, name: &str, diags: &mut Diagnostics) -> Option<u8> {
    match node {
        Node::Null => None,
        Node::String(_) | Node::Number(_) => {
            let raw = node.to_text();
            let parsed = parse_pin(&raw);
            if parsed.is_none() {
                diags.report(format!(
                    "{} {} has invalid pin '{}'",
                    what,
                    name,
                    raw.trim()
                ));
            }
            parsed
        }
        other => {
            diags.report(format!(
                "{} {} has invalid pin ({})",
                what,
                name,
                other.type_name()
            ));
            None
        }
    }
}

fn active(obj: &Node, default: bool, what: &str, name: &str, diags: &mut Diagnostics) -> bool {
    match obj.get("active") {
        Some(node) => as_flag(node).unwrap_or_else(|| {
            diags.report(format!(
                "{} {} has unparseable 'active' ({}); using {}",
                what,
                name,
                raw_text(node),
                default
            ));
            default
        }),
        None => {
            if default {
                diags.report(format!("{} {} missing 'active', defaulting to true", what, name));
            }
            default
        }
    }
}

/// Finite float at `key`. Absent or null keeps `default` silently; anything
/// else that is not a finite number is replaced by `default` and reported.
fn float_or(obj: &Node, key: &str, default: f32, name: &str, diags: &mut Diagnostics) -> f32 {
    match obj.get(key) {
        None | Some(Node::Null) => default,
        Some(node) => checked_float(node).unwrap_or_else(|problem| {
            diags.report(format!(
                "{} has {} '{}' ({}); using {}",
                name,
                problem,
                key,
                raw_text(node),
                default
            ));
            default
        }),
    }
}

fn optional_float(obj: &Node, key: &str, name: &str, diags: &mut Diagnostics) -> Option<f32> {
    match obj.get(key) {
        None | Some(Node::Null) => None,
        Some(node) => match checked_float(node) {
            Ok(value) => Some(value),
            Err(problem) => {
                diags.report(format!(
                    "{} has {} '{}' ({}); leaving it unset",
                    name,
                    problem,
                    key,
                    raw_text(node)
                ));
                None
            }
        },
    }
}

fn checked_float(node: &Node) -> Result<f32, &'static str> {
    let value = match node {
        Node::Number(n) => *n as f32,
        Node::String(s) => s.trim().parse::<f32>().map_err(|_| "non-numeric")?,
        _ => return Err("non-numeric"),
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err("non-finite")
    }
}

/// Raw value as quoted in diagnostics.
fn raw_text(node: &Node) -> String {
    match node {
        Node::String(s) => format!("'{}'", s),
        Node::Bool(_) | Node::Number(_) => node.to_text(),
        other => other.type_name().to_string(),
    }
}

fn as_int(node: &Node) -> Option<i64> {
    match node {
        Node::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        Node::String(s) => s.trim().parse::<i64>().ok(),
        Node::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn as_flag(node: &Node) -> Option<bool> {
    match node {
        Node::Bool(b) => Some(*b),
        Node::Number(n) => Some(*n != 0.0),
        Node::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" => Some(true),
            "false" | "0" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn scalar_text(node: &Node, section: ConfigSection, key: &str) -> StoreResult<String> {
    match node {
        Node::Array(_) | Node::Object(_) => Err(StoreError::decode(
            section,
            format!("'{}' must be a scalar, found {}", key, node.type_name()),
        )),
        other => Ok(other.to_text()),
    }
}

fn trimmed(obj: &Node, key: &str) -> String {
    obj.get(key)
        .map(|n| n.to_text().trim().to_string())
        .unwrap_or_default()
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
