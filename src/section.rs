//! Configuration sections and the file groups they are persisted in.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Parts of the configuration aggregate a document may mutate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ConfigSection: u16 {
        /// Node id and Wi-Fi settings.
        const INTERFACE = 0x01;
        /// Module flags.
        const MODULES = 0x02;
        /// Input and output channels.
        const IO = 0x04;
        /// Virtual multimeter channels.
        const VIRTUAL = 0x08;
        /// Peer credentials.
        const PEERS = 0x10;
    }
}

impl ConfigSection {
    /// Every section.
    pub const ALL: Self = Self::all();

    /// Groups that own at least one of these sections.
    pub fn groups(self) -> Vec<SectionGroup> {
        SectionGroup::ALL
            .into_iter()
            .filter(|g| self.intersects(g.sections()))
            .collect()
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", names.join("|"))
    }
}

/// A set of sections persisted together in one primary/backup file pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionGroup {
    /// Node identity, Wi-Fi settings and peer credentials.
    Interface,
    /// Module flags and IO channels.
    Io,
    /// Virtual multimeter channels.
    Virtual,
}

impl SectionGroup {
    /// Load order used at boot.
    pub const ALL: [SectionGroup; 3] = [Self::Interface, Self::Virtual, Self::Io];

    /// Sections stored in this group's file.
    pub fn sections(self) -> ConfigSection {
        match self {
            Self::Interface => ConfigSection::INTERFACE | ConfigSection::PEERS,
            Self::Io => ConfigSection::MODULES | ConfigSection::IO,
            Self::Virtual => ConfigSection::VIRTUAL,
        }
    }

    /// Name used in logs and the journal.
    pub fn label(self) -> &'static str {
        match self {
            Self::Interface => "interface",
            Self::Io => "IO",
            Self::Virtual => "virtual",
        }
    }
}

impl fmt::Display for SectionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for SectionGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interface" => Ok(Self::Interface),
            "io" => Ok(Self::Io),
            "virtual" | "virtual-multimeter" => Ok(Self::Virtual),
            other => Err(format!(
                "unknown section group '{}'. Must be one of: interface, io, virtual",
                other
            )),
        }
    }
}
