//! The configuration store: load chain, section-scoped saves, verification.
//!
//! # Overview
//!
//! [`ConfigStore`] owns the single live [`Config`] and the file primitive it
//! is persisted through. Configuration is split into three [`SectionGroup`]s,
//! each with a primary and a backup file.
//!
//! ## Loading
//!
//! [`ConfigStore::load_all`] never fails. Per group it tries the primary file,
//! then the backup. The IO group's files may also carry interface and virtual
//! sections written by older firmware; those fill groups that are still
//! unloaded. Anything still missing is taken from the legacy combined file,
//! and whatever remains gets factory defaults. Groups recovered from a
//! fallback source are rewritten to their primary file ("healed"); the legacy
//! file is deleted once every group it supplied has been healed.
//!
//! ## Saving
//!
//! [`ConfigStore::apply_section`] decodes a document on top of the current
//! configuration, writes each affected group, re-reads and compares what was
//! written, and only then commits. On any failure the written files are
//! restored from the current configuration and the in-memory state is left
//! untouched.

mod journal;

pub use journal::SaveJournal;

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::audit;
use crate::document::JsonCodec;
use crate::error::{StoreError, StoreResult, VerifyFailure};
use crate::model::Config;
use crate::record;
use crate::section::{ConfigSection, SectionGroup};
use crate::serializer::{Decoded, Diagnostics, SectionSerializer};
use crate::settings::StoreSettings;
use crate::storage::ConfigFs;

/// Where a group's configuration was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// The group's own primary file.
    Primary,
    /// The group's read-only backup file.
    Backup,
    /// Sections embedded in the IO group's file.
    IoCompanion,
    /// The combined file written by older firmware.
    Legacy,
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::Backup => "backup",
            Self::IoCompanion => "io file",
            Self::Legacy => "legacy",
        };
        f.write_str(name)
    }
}

/// Load state of one section group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// [`ConfigStore::load_all`] has not run yet.
    Unloaded,
    /// State came from a file.
    Loaded {
        /// File the state was decoded from.
        source: LoadSource,
        /// The primary file does not hold this state yet.
        needs_rewrite: bool,
    },
    /// No source succeeded; factory defaults are in use.
    Defaulted,
}

/// Outcome of rewriting a group's primary file during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealStatus {
    /// The primary already held the loaded state.
    NotNeeded,
    /// The primary was rewritten and verified.
    Rewritten,
    /// Rewriting failed; carries the error text.
    Failed(String),
}

/// How one group was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLoad {
    /// Group this entry describes.
    pub group: SectionGroup,
    /// `None` when defaults were applied.
    pub source: Option<LoadSource>,
    /// Whether the primary had to be rewritten.
    pub heal: HealStatus,
}

/// Summary of [`ConfigStore::load_all`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// One entry per group, in load order.
    pub groups: Vec<GroupLoad>,
    /// The legacy combined file was migrated and deleted.
    pub legacy_removed: bool,
    /// Diagnostics raised while decoding the sources that were used.
    pub diagnostics: usize,
}

impl LoadReport {
    /// Entry for `group`.
    pub fn group(&self, group: SectionGroup) -> Option<&GroupLoad> {
        self.groups.iter().find(|g| g.group == group)
    }
}

/// Result of a post-write verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The reloaded file matches.
    Verified,
    /// The reloaded file was rejected.
    Failed {
        /// Stage that rejected the file.
        reason: VerifyFailure,
        /// Error text or the first differing field.
        detail: String,
    },
}

impl VerificationOutcome {
    /// True for [`VerificationOutcome::Verified`].
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// What a successful [`ConfigStore::apply_section`] changed.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Groups whose files were rewritten.
    pub groups: Vec<SectionGroup>,
    /// Audit lines for channel changes.
    pub changes: Vec<String>,
    /// Substitutions made while decoding the request.
    pub diagnostics: Diagnostics,
}

/// Owner of the live configuration and its files.
pub struct ConfigStore<F: ConfigFs> {
    fs: F,
    settings: StoreSettings,
    serializer: SectionSerializer<JsonCodec>,
    journal: SaveJournal,
    current: Config,
    states: [GroupState; 3],
}

fn slot(group: SectionGroup) -> usize {
    match group {
        SectionGroup::Interface => 0,
        SectionGroup::Io => 1,
        SectionGroup::Virtual => 2,
    }
}

impl<F: ConfigFs> ConfigStore<F> {
    /// Create a store holding factory defaults. Call [`load_all`](Self::load_all) next.
    pub fn new(fs: F, settings: StoreSettings) -> Self {
        let serializer = SectionSerializer::new(JsonCodec::default(), settings.planner());
        let journal = SaveJournal::new(settings.files.journal.clone(), settings.journal_max_bytes);
        let current = Config::factory(&settings.factory_node_id());
        Self {
            fs,
            settings,
            serializer,
            journal,
            current,
            states: [GroupState::Unloaded; 3],
        }
    }

    /// The committed configuration.
    pub fn config(&self) -> &Config {
        &self.current
    }

    /// Settings the store was opened with.
    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Serializer used for every group file.
    pub fn serializer(&self) -> &SectionSerializer<JsonCodec> {
        &self.serializer
    }

    /// Current load state of `group`.
    pub fn group_state(&self, group: SectionGroup) -> GroupState {
        self.states[slot(group)]
    }

    /// Underlying file store.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Mutable access to the file store.
    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    /// Consume the store, returning its file store.
    pub fn into_fs(self) -> F {
        self.fs
    }

    /// Entries of the save journal, oldest first.
    pub fn journal_lines(&mut self) -> Vec<String> {
        self.journal.lines(&mut self.fs)
    }

    /// Serialize one group of the committed configuration.
    pub fn serialize_group(&self, group: SectionGroup) -> StoreResult<String> {
        self.serializer.serialize(&self.current, group.sections())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Run the load chain for every group. Never fails.
    pub fn load_all(&mut self) -> LoadReport {
        let mut config = Config::factory(&self.settings.factory_node_id());
        self.states = [GroupState::Unloaded; 3];
        let mut diagnostics = 0;

        for group in SectionGroup::ALL {
            if self.group_state(group) != GroupState::Unloaded {
                continue;
            }
            let sections = self.sections_to_read(group);
            for (source, name) in [
                (LoadSource::Primary, self.settings.files.primary(group).to_string()),
                (LoadSource::Backup, self.settings.files.backup(group).to_string()),
            ] {
                if !self.fs.exists(&name) {
                    debug!("{} config {} not present", group, name);
                    continue;
                }
                match self.read_file(&name, sections, &config) {
                    Ok(decoded) => {
                        info!("Loaded {} config from {} ({})", group, source, name);
                        diagnostics += decoded.diagnostics.len();
                        self.claim(group, source, decoded.present);
                        config = decoded.config;
                        break;
                    }
                    Err(e) => warn!("Failed to load {} config from {}: {}", group, name, e),
                }
            }
        }

        let mut legacy_groups = Vec::new();
        let missing: Vec<SectionGroup> = SectionGroup::ALL
            .into_iter()
            .filter(|g| self.group_state(*g) == GroupState::Unloaded)
            .collect();
        let legacy = self.settings.files.legacy.clone();
        if !missing.is_empty() && self.fs.exists(&legacy) {
            let sections = missing
                .iter()
                .fold(ConfigSection::empty(), |acc, g| acc | g.sections());
            match self.read_file(&legacy, sections, &config) {
                Ok(decoded) => {
                    info!("Migrating {} from legacy config {}", sections, legacy);
                    diagnostics += decoded.diagnostics.len();
                    config = decoded.config;
                    for group in &missing {
                        self.set_state(*group, GroupState::Loaded {
                            source: LoadSource::Legacy,
                            needs_rewrite: true,
                        });
                    }
                    legacy_groups = missing;
                }
                Err(e) => warn!("Failed to load legacy config {}: {}", legacy, e),
            }
        }

        for group in SectionGroup::ALL {
            if self.group_state(group) == GroupState::Unloaded {
                warn!("No usable {} config found, applying defaults", group);
                self.set_state(group, GroupState::Defaulted);
            }
        }

        self.current = config;

        let mut report = LoadReport {
            diagnostics,
            ..LoadReport::default()
        };
        for group in SectionGroup::ALL {
            let (source, heal) = match self.group_state(group) {
                GroupState::Loaded {
                    source,
                    needs_rewrite: false,
                } => (Some(source), HealStatus::NotNeeded),
                GroupState::Loaded { source, .. } => (Some(source), self.heal(group, source)),
                GroupState::Defaulted | GroupState::Unloaded => (None, self.persist_defaults(group)),
            };
            report.groups.push(GroupLoad {
                group,
                source,
                heal,
            });
        }

        if !legacy_groups.is_empty() {
            let all_healed = legacy_groups.iter().all(|g| {
                report
                    .group(*g)
                    .map_or(false, |l| l.heal == HealStatus::Rewritten)
            });
            if all_healed {
                match self.fs.remove(&legacy) {
                    Ok(()) => {
                        info!("Removed legacy config {} after migration", legacy);
                        report.legacy_removed = true;
                    }
                    Err(e) => warn!("Failed to remove legacy config {}: {}", legacy, e),
                }
            } else {
                warn!("Keeping legacy config {}: not every group was healed", legacy);
            }
        }

        report
    }

    /// Sections to decode from a group's own files.
    fn sections_to_read(&self, group: SectionGroup) -> ConfigSection {
        let mut sections = group.sections();
        if group == SectionGroup::Io {
            for other in [SectionGroup::Interface, SectionGroup::Virtual] {
                if self.group_state(other) == GroupState::Unloaded {
                    sections |= other.sections();
                }
            }
        }
        sections
    }

    /// Mark `group` loaded, plus any unloaded group whose sections came along.
    fn claim(&mut self, group: SectionGroup, source: LoadSource, present: ConfigSection) {
        self.set_state(
            group,
            GroupState::Loaded {
                source,
                needs_rewrite: source != LoadSource::Primary,
            },
        );
        for other in SectionGroup::ALL {
            if other != group
                && self.group_state(other) == GroupState::Unloaded
                && present.intersects(other.sections())
            {
                info!("Recovered {} config from the {} file", other, group);
                self.set_state(
                    other,
                    GroupState::Loaded {
                        source: LoadSource::IoCompanion,
                        needs_rewrite: true,
                    },
                );
            }
        }
    }

    fn heal(&mut self, group: SectionGroup, source: LoadSource) -> HealStatus {
        let current = self.current.clone();
        match self.persist_group(&current, group) {
            Ok(()) => {
                info!("Healed {} config: rewrote primary from {}", group, source);
                self.journal
                    .record(&mut self.fs, &format!("heal {}: rewritten from {}", group, source));
                self.set_state(
                    group,
                    GroupState::Loaded {
                        source,
                        needs_rewrite: false,
                    },
                );
                HealStatus::Rewritten
            }
            Err(e) => {
                warn!("Failed to heal {} config: {}", group, e);
                HealStatus::Failed(e.to_string())
            }
        }
    }

    fn persist_defaults(&mut self, group: SectionGroup) -> HealStatus {
        let current = self.current.clone();
        match self.persist_group(&current, group) {
            Ok(()) => {
                info!("Saved default {} config", group);
                HealStatus::Rewritten
            }
            Err(e) => {
                warn!("Failed to save default {} config: {}", group, e);
                HealStatus::Failed(e.to_string())
            }
        }
    }

    fn set_state(&mut self, group: SectionGroup, state: GroupState) {
        self.states[slot(group)] = state;
    }

    // ========================================================================
    // Saving
    // ========================================================================

    /// Decode `text` into the given sections, persist, verify and commit.
    ///
    /// Every group owning one of `sections` is rewritten in full. On error
    /// the committed configuration is unchanged and written files have been
    /// restored (best effort).
    ///
    /// # Errors
    ///
    /// `Decode` and `CapacityExceeded` before anything is written; `Write`
    /// and `VerificationMismatch` after a rollback.
    pub fn apply_section(&mut self, sections: ConfigSection, text: &str) -> StoreResult<ApplyOutcome> {
        if sections.is_empty() {
            return Err(StoreError::decode(sections, "no sections requested"));
        }
        let Decoded {
            config: candidate,
            diagnostics,
            ..
        } = self.serializer.deserialize(text, sections, &self.current)?;

        let groups = sections.groups();
        let affected = groups
            .iter()
            .fold(ConfigSection::empty(), |acc, g| acc | g.sections());
        let label = affected.to_string();
        self.journal
            .record(&mut self.fs, &format!("apply {}: start ({} bytes)", label, text.len()));
        if let Ok(dump) = self.serializer.redacted(&candidate, affected) {
            debug!("Candidate {} config: {}", label, dump);
        }

        let mut written = Vec::new();
        for group in &groups {
            let result = self
                .persist_group(&candidate, *group)
                .and_then(|()| {
                    written.push(*group);
                    match self.verify(&candidate, group.sections()) {
                        VerificationOutcome::Verified => Ok(()),
                        VerificationOutcome::Failed { reason, detail } => {
                            Err(StoreError::VerificationMismatch {
                                path: self.settings.files.primary(*group).to_string(),
                                reason,
                                detail,
                            })
                        }
                    }
                });
            if let Err(e) = result {
                // A failed write may still have clobbered the file.
                if !written.contains(group) {
                    written.push(*group);
                }
                warn!("Saving {} config failed: {}", group, e);
                self.rollback(&written);
                self.journal
                    .record(&mut self.fs, &format!("apply {}: failed ({}) {}", label, e.kind(), e));
                return Err(e);
            }
        }

        let changes = if affected.intersects(ConfigSection::IO | ConfigSection::VIRTUAL) {
            audit::diff(&self.current, &candidate)
        } else {
            Vec::new()
        };
        for line in &changes {
            info!("{}", line);
        }

        self.current = candidate;
        for group in &groups {
            self.set_state(
                *group,
                GroupState::Loaded {
                    source: LoadSource::Primary,
                    needs_rewrite: false,
                },
            );
        }
        info!("Saved and verified {} config", label);
        self.journal
            .record(&mut self.fs, &format!("apply {}: ok, verified", label));

        Ok(ApplyOutcome {
            groups,
            changes,
            diagnostics,
        })
    }

    /// Re-read the files holding `sections` and compare against `expected`.
    ///
    /// Files are decoded onto factory defaults, so fields missing from disk
    /// show up as mismatches instead of being filled from `expected`.
    pub fn verify(&mut self, expected: &Config, sections: ConfigSection) -> VerificationOutcome {
        let baseline = Config::factory(&self.settings.factory_node_id());
        for group in sections.groups() {
            let scope = sections & group.sections();
            let name = self.settings.files.primary(group).to_string();
            let bytes = match self.fs.read(&name) {
                Ok(bytes) => bytes,
                Err(e) => {
                    return VerificationOutcome::Failed {
                        reason: VerifyFailure::Unreadable,
                        detail: format!("{}: {}", name, e),
                    };
                }
            };
            let decoded = record::open(&bytes)
                .and_then(|payload| self.decode_payload(payload, scope, &baseline));
            let reloaded = match decoded {
                Ok(decoded) => decoded.config,
                Err(e) => {
                    let reason = match e {
                        StoreError::Envelope(_) => VerifyFailure::Envelope,
                        StoreError::ChecksumMismatch { .. } => VerifyFailure::Checksum,
                        _ => VerifyFailure::Decode,
                    };
                    return VerificationOutcome::Failed {
                        reason,
                        detail: e.to_string(),
                    };
                }
            };
            if let Some(mismatch) = audit::first_mismatch(expected, &reloaded, scope) {
                return VerificationOutcome::Failed {
                    reason: VerifyFailure::FieldMismatch,
                    detail: mismatch.to_string(),
                };
            }
            debug!("Verified {} in {}", scope, name);
        }
        VerificationOutcome::Verified
    }

    /// Restore written groups from the committed configuration.
    fn rollback(&mut self, groups: &[SectionGroup]) {
        let current = self.current.clone();
        for group in groups {
            match self.persist_group(&current, *group) {
                Ok(()) => info!("Restored {} config after failed save", group),
                Err(e) => error!("Rollback of {} config failed: {}", group, e),
            }
        }
    }

    // ========================================================================
    // File helpers
    // ========================================================================

    /// Serialize `config`'s group and write it to the primary file.
    fn persist_group(&mut self, config: &Config, group: SectionGroup) -> StoreResult<()> {
        let sections = group.sections();
        let text = self.serializer.serialize(config, sections)?;
        let name = self.settings.files.primary(group).to_string();
        let bytes = if self.settings.write_envelope {
            record::seal(sections, text.as_bytes())?
        } else {
            text.into_bytes()
        };
        match self.fs.write(&name, &bytes) {
            Ok(n) if n == bytes.len() => Ok(()),
            Ok(n) => Err(StoreError::Write {
                path: name,
                detail: format!("short write ({}/{} bytes)", n, bytes.len()),
            }),
            Err(e) => Err(StoreError::Write {
                path: name,
                detail: e.to_string(),
            }),
        }
    }

    fn read_file(
        &mut self,
        name: &str,
        sections: ConfigSection,
        previous: &Config,
    ) -> StoreResult<Decoded> {
        let bytes = self.fs.read(name).map_err(|source| StoreError::Read {
            path: name.to_string(),
            source,
        })?;
        let payload = record::open(&bytes)?;
        self.decode_payload(payload, sections, previous)
    }

    fn decode_payload(
        &self,
        payload: &[u8],
        sections: ConfigSection,
        previous: &Config,
    ) -> StoreResult<Decoded> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| StoreError::decode(sections, format!("payload is not UTF-8: {}", e)))?;
        self.serializer.deserialize(text, sections, previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryFs, WriteFault};
    use tracing_test::traced_test;

    const IO_DOC: &str = r#"{"modules":{"ads1115":true},
        "inputs":[{"name":"IN1","type":"ads1115","adsChannel":0,"scale":2.5}],
        "outputs":[{"name":"OUT1","type":"gpio","pin":"D5"}]}"#;

    fn loaded_store(fs: MemoryFs) -> ConfigStore<MemoryFs> {
        let mut store = ConfigStore::new(fs, StoreSettings::default());
        store.load_all();
        store
    }

    #[test]
    fn test_empty_store_defaults_and_persists() {
        let mut store = ConfigStore::new(MemoryFs::new(), StoreSettings::default());
        let report = store.load_all();
        for load in &report.groups {
            assert_eq!(load.source, None);
            assert_eq!(load.heal, HealStatus::Rewritten);
            assert_eq!(store.group_state(load.group), GroupState::Defaulted);
        }
        assert_eq!(store.config().node_id, "labnode0001");
        assert!(store.fs().exists("interface_config.json"));
        assert!(store.fs().exists("io_config.json"));
        assert!(store.fs().exists("virtual_config.json"));
    }

    #[test]
    fn test_apply_commits_and_persists() {
        let mut store = loaded_store(MemoryFs::new());
        let outcome = store.apply_section(ConfigSection::MODULES | ConfigSection::IO, IO_DOC).unwrap();
        assert_eq!(outcome.groups, vec![SectionGroup::Io]);
        assert!(outcome
            .changes
            .iter()
            .any(|l| l.starts_with("Input added: IN1 (type=ads1115")));
        assert_eq!(store.config().inputs[0].scale, 2.5);
        assert!(store.config().modules.ads1115);
        let saved = store.fs().contents_str("io_config.json").unwrap();
        assert!(saved.contains("\"adsChannel\":0"));
        let journal = store.journal_lines();
        assert!(journal.last().unwrap().ends_with("apply MODULES|IO: ok, verified"));
    }

    #[test]
    fn test_apply_modules_only_rewrites_whole_io_group() {
        let mut store = loaded_store(MemoryFs::new());
        store.apply_section(ConfigSection::MODULES | ConfigSection::IO, IO_DOC).unwrap();
        store
            .apply_section(ConfigSection::MODULES, r#"{"modules":{"zmct":true}}"#)
            .unwrap();
        assert_eq!(store.config().inputs.len(), 1);
        let saved = store.fs().contents_str("io_config.json").unwrap();
        assert!(saved.contains("\"zmct\":true"));
        assert!(saved.contains("\"IN1\""));
    }

    #[test]
    #[traced_test]
    fn test_corrupted_write_rolls_back() {
        let mut store = loaded_store(MemoryFs::new());
        let before = store.config().clone();
        let before_file = store.fs().contents("io_config.json").unwrap().to_vec();

        store.fs_mut().inject_write_fault(
            "io_config.json",
            WriteFault::Replace(br#"{"inputs":[],"outputs":[]}"#.to_vec()),
        );
        let err = store
            .apply_section(ConfigSection::IO | ConfigSection::MODULES, IO_DOC)
            .unwrap_err();
        match &err {
            StoreError::VerificationMismatch { reason, detail, .. } => {
                assert_eq!(*reason, VerifyFailure::FieldMismatch);
                assert!(detail.starts_with("modules.ads1115"), "{}", detail);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(store.config(), &before);
        assert_eq!(store.fs().contents("io_config.json").unwrap(), &before_file[..]);
        assert!(logs_contain("Restored IO config after failed save"));
    }

    #[test]
    fn test_failed_write_is_write_error() {
        let mut store = loaded_store(MemoryFs::new());
        store
            .fs_mut()
            .inject_write_fault("virtual_config.json", WriteFault::Short(3));
        let err = store
            .apply_section(ConfigSection::VIRTUAL, r#"[{"id":"m1"}]"#)
            .unwrap_err();
        assert_eq!(err.kind(), "save_failed");
        assert!(err.to_string().contains("short write (3/"));
        assert!(store.config().meter_channels.is_empty());
        // Rollback rewrote the truncated file.
        let mut fresh = loaded_store(store.into_fs());
        assert!(fresh.config().meter_channels.is_empty());
        assert_eq!(
            fresh.group_state(SectionGroup::Virtual),
            GroupState::Loaded {
                source: LoadSource::Primary,
                needs_rewrite: false
            }
        );
        assert!(fresh.verify(&Config::factory("labnode0001"), ConfigSection::VIRTUAL).is_verified());
    }

    #[test]
    fn test_decode_error_writes_nothing() {
        let mut store = loaded_store(MemoryFs::new());
        let writes = store.fs().write_count("io_config.json");
        let err = store
            .apply_section(ConfigSection::IO, r#"{"inputs":"not json"#)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_json");
        assert_eq!(store.fs().write_count("io_config.json"), writes);
    }

    #[test]
    fn test_verify_reports_checksum_failure() {
        let mut settings = StoreSettings::default();
        settings.write_envelope = true;
        let mut store = ConfigStore::new(MemoryFs::new(), settings);
        store.load_all();
        let expected = store.config().clone();
        assert!(store.verify(&expected, ConfigSection::ALL).is_verified());

        store.fs_mut().corrupt("interface_config.json", 20, b"#");
        match store.verify(&expected, ConfigSection::INTERFACE) {
            VerificationOutcome::Failed { reason, .. } => assert_eq!(reason, VerifyFailure::Checksum),
            VerificationOutcome::Verified => panic!("corruption went unnoticed"),
        }
    }

    #[test]
    #[traced_test]
    fn test_non_finite_calibration_is_replaced_and_verified() {
        let mut store = loaded_store(MemoryFs::new());
        let outcome = store
            .apply_section(
                ConfigSection::IO,
                r#"{"inputs":[{"name":"IN1","type":"adc","pin":"A0","scale":"nan","offset":1e39}],
                    "outputs":[{"name":"OUT1","type":"gpio","pin":"D5","value":"inf"}]}"#,
            )
            .unwrap();
        let input = &store.config().inputs[0];
        assert_eq!(input.scale, 1.0);
        assert_eq!(input.offset, 0.0);
        assert_eq!(store.config().outputs[0].value, 0.0);

        let messages = outcome.diagnostics.messages();
        assert!(messages.contains(&"Input IN1 has non-finite 'scale' ('nan'); using 1".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("Input IN1 has non-finite 'offset'")));
        assert!(messages.iter().any(|m| m.starts_with("Output OUT1 has non-finite 'value'")));
        assert!(logs_contain("non-finite 'scale'"));

        let mut fresh = loaded_store(store.into_fs());
        assert_eq!(fresh.config().inputs[0].scale, 1.0);
        let expected = fresh.config().clone();
        assert!(fresh.verify(&expected, ConfigSection::IO).is_verified());
    }
}
