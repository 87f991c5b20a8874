//! Request/response surface the node's web handlers call.
//!
//! Transport is not handled here: each operation takes the raw request body
//! and returns the status code and JSON body to send back.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::document::Node;
use crate::error::{StoreError, StoreResult};
use crate::limits::{MAX_INPUTS, MAX_OUTPUTS};
use crate::section::{ConfigSection, SectionGroup};
use crate::storage::ConfigFs;
use crate::store::ConfigStore;

/// Status code, JSON body and whether the node must restart to apply it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON response body.
    pub body: Value,
    /// The node must reboot for the change to take effect.
    pub restart_required: bool,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            restart_required: false,
        }
    }

    fn error(status: u16, error: &str, detail: Option<String>) -> Self {
        let mut body = json!({ "error": error });
        if let Some(detail) = detail.filter(|d| !d.is_empty()) {
            body["detail"] = Value::String(detail);
        }
        Self {
            status,
            body,
            restart_required: false,
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as sent on the wire.
    pub fn body_text(&self) -> String {
        self.body.to_string()
    }
}

impl From<StoreError> for ApiResponse {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::Decode { .. } | StoreError::CapacityExceeded { .. } => 400,
            _ => 500,
        };
        Self::error(status, err.kind(), Some(err.detail()))
    }
}

/// Section-group endpoints over a [`ConfigStore`].
pub struct SectionApi<F: ConfigFs> {
    store: ConfigStore<F>,
}

impl<F: ConfigFs> SectionApi<F> {
    /// Serve requests from a loaded store.
    pub fn new(store: ConfigStore<F>) -> Self {
        Self { store }
    }

    /// Store behind the endpoints.
    pub fn store(&self) -> &ConfigStore<F> {
        &self.store
    }

    /// Mutable access to the store.
    pub fn store_mut(&mut self) -> &mut ConfigStore<F> {
        &mut self.store
    }

    /// Consume the API, returning the store.
    pub fn into_store(self) -> ConfigStore<F> {
        self.store
    }

    /// Current configuration of one group plus its runtime fields.
    pub fn get_section(&self, group: SectionGroup) -> ApiResponse {
        let fw_version = self.store.settings().fw_version.clone();
        let node_id = self.store.config().node_id.clone();
        let rendered = self.store.serializer().serialize_with(
            self.store.config(),
            group.sections(),
            |root| match group {
                SectionGroup::Interface => {
                    root.insert("fwVersion", fw_version);
                }
                SectionGroup::Io => {
                    let mut limits = Node::object();
                    limits
                        .insert("maxInputs", MAX_INPUTS)
                        .insert("maxOutputs", MAX_OUTPUTS);
                    let mut metadata = Node::object();
                    metadata
                        .insert("nodeId", node_id)
                        .insert("fwVersion", fw_version);
                    root.insert("limits", limits).insert("metadata", metadata);
                }
                SectionGroup::Virtual => {}
            },
        );
        self.respond_with_document(rendered, group.label())
    }

    /// Every section of the current configuration.
    pub fn get_all(&self) -> ApiResponse {
        let fw_version = self.store.settings().fw_version.clone();
        let rendered = self.store.serializer().serialize_with(
            self.store.config(),
            ConfigSection::ALL,
            |root| {
                root.insert("fwVersion", fw_version);
            },
        );
        self.respond_with_document(rendered, "full")
    }

    /// Replace one group from a request body.
    pub fn post_section(&mut self, group: SectionGroup, body: &str) -> ApiResponse {
        if body.trim().is_empty() {
            warn!("Rejected {} config update: empty body", group);
            return ApiResponse::error(400, "no_body", None);
        }
        info!("{} config update received ({} bytes)", group, body.len());

        let outcome = match self.store.apply_section(group.sections(), body) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{} config update rejected: {}", group, e);
                return e.into();
            }
        };

        let mut response = json!({ "status": "ok", "verified": true });
        if !outcome.diagnostics.is_empty() {
            response["warnings"] = json!(outcome.diagnostics.messages());
        }
        if !outcome.changes.is_empty() {
            response["changes"] = json!(outcome.changes);
        }

        match group {
            SectionGroup::Interface => {
                let config = self.store.config();
                response["requiresReboot"] = Value::Bool(true);
                response["nodeId"] = Value::String(config.node_id.clone());
                response["peerCount"] = json!(config.peers.len());
                let mut ack = ApiResponse::ok(response);
                ack.restart_required = true;
                ack
            }
            SectionGroup::Io => {
                response["requiresReboot"] = Value::Bool(true);
                ApiResponse::ok(response)
            }
            SectionGroup::Virtual => {
                match self.document_value(ConfigSection::VIRTUAL) {
                    Ok(Value::Object(mut applied)) => {
                        response["applied"] = applied
                            .remove("virtualMultimeter")
                            .unwrap_or(Value::Null);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Could not echo applied virtual config: {}", e),
                }
                ApiResponse::ok(response)
            }
        }
    }

    /// Replace the peer list. The body must carry a `peers` array.
    pub fn post_peers(&mut self, body: &str) -> ApiResponse {
        if body.trim().is_empty() {
            return ApiResponse::error(400, "no_body", None);
        }
        match serde_json::from_str::<Value>(body) {
            Ok(doc) if doc.get("peers").map_or(false, Value::is_array) => {}
            Ok(_) => {
                return ApiResponse::error(
                    400,
                    "invalid_json",
                    Some("'peers' must be an array".to_string()),
                )
            }
            Err(e) => return ApiResponse::error(400, "invalid_json", Some(e.to_string())),
        }

        match self.store.apply_section(ConfigSection::PEERS, body) {
            Ok(_) => {
                let count = self.store.config().peers.len();
                info!("Peer list replaced ({} peers)", count);
                ApiResponse::ok(json!({ "status": "ok", "verified": true, "peerCount": count }))
            }
            Err(e) => {
                warn!("Peer update rejected: {}", e);
                e.into()
            }
        }
    }

    fn document_value(&self, sections: ConfigSection) -> StoreResult<Value> {
        let text = self
            .store
            .serializer()
            .serialize(self.store.config(), sections)?;
        serde_json::from_str(&text).map_err(|e| StoreError::decode(sections, e.to_string()))
    }

    fn respond_with_document(&self, rendered: StoreResult<String>, label: &str) -> ApiResponse {
        let parsed = rendered.and_then(|text| {
            serde_json::from_str::<Value>(&text)
                .map_err(|e| StoreError::decode(ConfigSection::ALL, e.to_string()))
        });
        match parsed {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => {
                warn!("Failed to encode {} config: {}", label, e);
                ApiResponse::error(500, "encode_failed", Some(e.detail()))
            }
        }
    }
}
