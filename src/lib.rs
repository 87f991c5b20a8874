//! Configuration persistence for lab automation nodes.
//!
//! This library stores, reloads, partially updates and verifies a node's
//! configuration (network identity, hardware modules, IO channels, virtual
//! multimeter channels and peer credentials) on a small flat file store,
//! under a bounded document memory budget.
//!
//! The entry point is [`store::ConfigStore`]: call
//! [`load_all`](store::ConfigStore::load_all) at boot, then
//! [`apply_section`](store::ConfigStore::apply_section) for every update.
//! [`api::SectionApi`] wraps the store in the request/response shapes the
//! node's web handlers use.

pub mod api;
pub mod audit;
pub mod capacity;
pub mod document;
pub mod error;
pub mod limits;
pub mod model;
pub mod record;
pub mod section;
pub mod serializer;
pub mod settings;
pub mod storage;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use model::Config;
pub use section::{ConfigSection, SectionGroup};
pub use settings::StoreSettings;
pub use store::ConfigStore;
