//! Conversion between [`Config`] and textual documents, one section set at a time.
//!
//! # Overview
//!
//! [`SectionSerializer::serialize`] emits only the requested sections, plus
//! informational counters (`inputCount`, `outputCount`, `peerCount`,
//! `channelCount`) that are ignored when reading back.
//!
//! [`SectionSerializer::deserialize`] starts from a copy of the previous
//! configuration and overwrites only the requested sections. Every value it
//! has to substitute (missing names, unknown types, out-of-range channels...)
//! is reported through [`Diagnostics`] and logged; only wrong-shaped section
//! bodies fail the whole document.
//!
//! Both directions run under the [`CapacityPlanner`] budget and retry with a
//! larger buffer on overflow.

mod decode;
mod encode;

use tracing::{debug, warn};

use crate::capacity::CapacityPlanner;
use crate::document::{DocumentCodec, JsonCodec, Node};
use crate::error::StoreResult;
use crate::model::Config;
use crate::section::ConfigSection;

/// Substitutions and rejections collected while decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    /// Record and log a diagnostic.
    pub fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.messages.push(message);
    }

    /// Messages in the order they were raised.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// True when nothing was substituted.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

/// Result of a successful decode.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Base configuration with the document applied.
    pub config: Config,
    /// Requested sections the document actually carried.
    pub present: ConfigSection,
    /// Substitutions made while decoding.
    pub diagnostics: Diagnostics,
}

/// Reads and writes configuration documents through a [`DocumentCodec`].
#[derive(Debug, Clone)]
pub struct SectionSerializer<C = JsonCodec> {
    codec: C,
    planner: CapacityPlanner,
}

impl Default for SectionSerializer<JsonCodec> {
    fn default() -> Self {
        Self::new(JsonCodec::default(), CapacityPlanner::default())
    }
}

impl<C: DocumentCodec> SectionSerializer<C> {
    /// Serializer using `codec` under `planner`'s bounds.
    pub fn new(codec: C, planner: CapacityPlanner) -> Self {
        Self { codec, planner }
    }

    /// Capacity bounds in use.
    pub fn planner(&self) -> &CapacityPlanner {
        &self.planner
    }

    /// Render the requested sections of `config`.
    pub fn serialize(&self, config: &Config, sections: ConfigSection) -> StoreResult<String> {
        self.render(&encode::encode(config, sections), sections)
    }

    /// Render the requested sections with extra fields merged into the root.
    pub fn serialize_with<F>(
        &self,
        config: &Config,
        sections: ConfigSection,
        extend: F,
    ) -> StoreResult<String>
    where
        F: FnOnce(&mut Node),
    {
        let mut root = encode::encode(config, sections);
        extend(&mut root);
        self.render(&root, sections)
    }

    /// Render for logging, with the Wi-Fi password masked.
    pub fn redacted(&self, config: &Config, sections: ConfigSection) -> StoreResult<String> {
        self.serialize_with(config, sections, |root| {
            if let Some(Node::Object(entries)) = root_entry_mut(root, "wifi") {
                for (key, value) in entries.iter_mut() {
                    if key == "pass" && !value.to_text().is_empty() {
                        *value = Node::from("***");
                    }
                }
            }
        })
    }

    /// Decode `text` on top of `previous`, touching only `sections`.
    pub fn deserialize(
        &self,
        text: &str,
        sections: ConfigSection,
        previous: &Config,
    ) -> StoreResult<Decoded> {
        let root = self.parse(text, sections)?;
        let nested = |inner: &str| self.parse(inner, sections);

        let mut config = previous.clone();
        let mut diagnostics = Diagnostics::default();
        let present = decode::apply(&root, sections, &mut config, &mut diagnostics, &nested)?;

        debug!(
            "Decoded {} from {} bytes (present: {}, {} diagnostics)",
            sections,
            text.len(),
            present,
            diagnostics.len()
        );
        Ok(Decoded {
            config,
            present,
            diagnostics,
        })
    }

    fn parse(&self, text: &str, sections: ConfigSection) -> StoreResult<Node> {
        let label = sections.to_string();
        self.planner.run_with_growth(
            self.planner.capacity_for(text.len()),
            &label,
            sections,
            |capacity| self.codec.parse(text, capacity),
        )
    }

    fn render(&self, root: &Node, sections: ConfigSection) -> StoreResult<String> {
        let label = sections.to_string();
        self.planner
            .run_with_growth(self.planner.capacity_for(0), &label, sections, |capacity| {
                self.codec.render(root, capacity)
            })
    }
}

fn root_entry_mut<'a>(root: &'a mut Node, key: &str) -> Option<&'a mut Node> {
    match root {
        Node::Object(entries) => entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InputChannel, InputKind, MeterChannel, OutputChannel, OutputKind, PeerCredential};
    use tracing_test::traced_test;

    fn sample_config() -> Config {
        let mut config = Config::factory("labnode0001");
        config.wifi.mode = "STA".into();
        config.wifi.ssid = "lab".into();
        config.wifi.pass = "hunter2".into();
        config.modules.ads1115 = true;
        config.inputs.push(InputChannel {
            name: "IN1".into(),
            kind: InputKind::Ads1115,
            pin: None,
            ads_channel: Some(2),
            remote_node: String::new(),
            remote_name: String::new(),
            scale: 0.125,
            offset: -1.5,
            unit: "V".into(),
            active: true,
        });
        config.outputs.push(OutputChannel {
            kind: OutputKind::Pwm010,
            pin: Some(5),
            active: true,
            value: 3.3,
            ..OutputChannel::slot(0)
        });
        config.meter_channels.push(MeterChannel {
            id: "m1".into(),
            name: "Voltage".into(),
            label: "U".into(),
            input: "IN1".into(),
            range_max: Some(30.0),
            ..MeterChannel::default()
        });
        config.peers.push(PeerCredential {
            node_id: "labnode0002".into(),
            pin: "1234".into(),
        });
        config
    }

    #[test]
    fn test_round_trip_each_group() {
        let serializer = SectionSerializer::default();
        let config = sample_config();
        let blank = Config::factory("other");
        for group in crate::section::SectionGroup::ALL {
            let sections = group.sections();
            let text = serializer.serialize(&config, sections).unwrap();
            let decoded = serializer.deserialize(&text, sections, &blank).unwrap();
            let expected_diff = crate::audit::first_mismatch(&config, &decoded.config, sections);
            assert_eq!(expected_diff, None, "group {} did not round-trip", group);
            assert_eq!(decoded.present, sections);
        }
    }

    #[test]
    fn test_serialize_only_requested_sections() {
        let serializer = SectionSerializer::default();
        let text = serializer
            .serialize(&sample_config(), ConfigSection::VIRTUAL)
            .unwrap();
        assert!(text.contains("\"virtualMultimeter\""));
        assert!(text.contains("\"channelCount\":1"));
        assert!(!text.contains("nodeId"));
        assert!(!text.contains("inputs"));
    }

    #[test]
    fn test_redacted_masks_password() {
        let serializer = SectionSerializer::default();
        let text = serializer
            .redacted(&sample_config(), ConfigSection::INTERFACE)
            .unwrap();
        assert!(text.contains("\"pass\":\"***\""));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_io_section_isolation() {
        let serializer = SectionSerializer::default();
        let previous = sample_config();
        let text = r#"{"nodeId":"intruder","wifi":{"ssid":"x"},"peers":[],
                       "virtualMultimeter":[],"inputs":[{"name":"A","type":"adc"}],"outputs":[]}"#;
        let decoded = serializer
            .deserialize(text, ConfigSection::IO, &previous)
            .unwrap();
        let config = decoded.config;
        assert_eq!(config.node_id, previous.node_id);
        assert_eq!(config.wifi, previous.wifi);
        assert_eq!(config.peers, previous.peers);
        assert_eq!(config.meter_channels, previous.meter_channels);
        assert_eq!(config.modules, previous.modules);
        assert_eq!(config.inputs.len(), 1);
        assert!(config.outputs.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_duplicate_input_names_dropped() {
        let serializer = SectionSerializer::default();
        let text = r#"{"inputs":[{"name":"IN1","type":"adc","pin":"A0"},
                                 {"name":"IN1","type":"remote"}],"outputs":[]}"#;
        let decoded = serializer
            .deserialize(text, ConfigSection::IO, &Config::factory("n"))
            .unwrap();
        assert_eq!(decoded.config.inputs.len(), 1);
        assert_eq!(decoded.config.inputs[0].kind, InputKind::Adc);
        assert!(logs_contain("Duplicate input name 'IN1' rejected"));
    }

    #[test]
    fn test_wrong_shape_is_scoped_decode_error() {
        let serializer = SectionSerializer::default();
        let err = serializer
            .deserialize(r#"{"inputs":42}"#, ConfigSection::IO, &Config::factory("n"))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_json");
        assert!(err.to_string().contains("IO"));
    }

    #[test]
    fn test_truncated_text_is_decode_error() {
        let serializer = SectionSerializer::default();
        let err = serializer
            .deserialize(r#"{"nodeId":"ab"#, ConfigSection::INTERFACE, &Config::factory("n"))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_json");
    }

    #[test]
    fn test_large_document_grows_buffer() {
        let serializer = SectionSerializer::default();
        let mut config = Config::factory("n");
        for i in 0..16 {
            config.peers.push(PeerCredential {
                node_id: format!("peer-node-with-a-long-identifier-{:02}", i),
                pin: "000000".into(),
            });
        }
        let text = serializer.serialize(&config, ConfigSection::PEERS).unwrap();
        let decoded = serializer
            .deserialize(&text, ConfigSection::PEERS, &Config::factory("n"))
            .unwrap();
        assert_eq!(decoded.config.peers, config.peers);
    }

    #[test]
    fn test_oversized_document_exceeds_capacity() {
        let serializer = SectionSerializer::new(
            JsonCodec::default(),
            CapacityPlanner::new(256, 64, 512, 128),
        );
        let mut config = Config::factory("n");
        config.node_id = "x".repeat(600);
        let err = serializer
            .serialize(&config, ConfigSection::INTERFACE)
            .unwrap_err();
        assert_eq!(err.kind(), "payload_too_large");
    }
}
