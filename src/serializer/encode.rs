use crate::document::Node;
use crate::model::pins::{format_i2c_address, pin_name};
use crate::model::{Config, InputChannel, MeterChannel, OutputChannel};
use crate::section::ConfigSection;

pub(super) fn encode(config: &Config, sections: ConfigSection) -> Node {
    let mut root = Node::object();

    if sections.contains(ConfigSection::INTERFACE) {
        let mut wifi = Node::object();
        wifi.insert("mode", config.wifi.mode.as_str())
            .insert("ssid", config.wifi.ssid.as_str())
            .insert("pass", config.wifi.pass.as_str());
        root.insert("nodeId", config.node_id.as_str()).insert("wifi", wifi);
    }

    if sections.contains(ConfigSection::MODULES) {
        let mut modules = Node::object();
        for (key, on) in config.modules.flags() {
            modules.insert(key, on);
        }
        root.insert("modules", modules);
    }

    if sections.contains(ConfigSection::IO) {
        root.insert("inputCount", config.inputs.len())
            .insert("inputs", config.inputs.iter().map(input).collect::<Vec<_>>())
            .insert("outputCount", config.outputs.len())
            .insert("outputs", config.outputs.iter().map(output).collect::<Vec<_>>());
    }

    if sections.contains(ConfigSection::VIRTUAL) {
        let mut meter = Node::object();
        meter
            .insert("channelCount", config.meter_channels.len())
            .insert(
                "channels",
                config.meter_channels.iter().map(meter_channel).collect::<Vec<_>>(),
            );
        root.insert("virtualMultimeter", meter);
    }

    if sections.contains(ConfigSection::PEERS) {
        let peers: Vec<Node> = config
            .peers
            .iter()
            .map(|peer| {
                let mut node = Node::object();
                node.insert("nodeId", peer.node_id.as_str())
                    .insert("pin", peer.pin.as_str());
                node
            })
            .collect();
        root.insert("peerCount", config.peers.len()).insert("peers", peers);
    }

    root
}

fn input(ch: &InputChannel) -> Node {
    let mut node = Node::object();
    node.insert("name", ch.name.as_str())
        .insert("type", ch.kind.as_str())
        .insert("pin", ch.pin.map(pin_name))
        .insert("adsChannel", ch.ads_channel)
        .insert("remoteNode", ch.remote_node.as_str())
        .insert("remoteName", ch.remote_name.as_str())
        .insert("scale", ch.scale)
        .insert("offset", ch.offset)
        .insert("unit", ch.unit.as_str())
        .insert("active", ch.active);
    node
}

fn output(ch: &OutputChannel) -> Node {
    let mut node = Node::object();
    node.insert("name", ch.name.as_str())
        .insert("type", ch.kind.as_str())
        .insert("pin", ch.pin.map(pin_name))
        .insert("pwmFreq", ch.pwm_freq)
        .insert("i2cAddress", format_i2c_address(ch.i2c_address))
        .insert("scale", ch.scale)
        .insert("offset", ch.offset)
        .insert("active", ch.active)
        .insert("value", ch.value);
    node
}

fn meter_channel(ch: &MeterChannel) -> Node {
    let mut node = Node::object();
    node.insert("id", ch.id.as_str())
        .insert("name", ch.name.as_str())
        .insert("label", ch.label.as_str())
        .insert("input", ch.input.as_str())
        .insert("unit", ch.unit.as_str())
        .insert("symbol", ch.symbol.as_str())
        .insert("enabled", ch.enabled)
        .insert("scale", ch.scale)
        .insert("offset", ch.offset)
        .insert("rangeMin", ch.range_min)
        .insert("rangeMax", ch.range_max)
        .insert("bits", ch.bits);
    node
}
