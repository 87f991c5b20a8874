//! Append-only text log of configuration saves.

use chrono::{SecondsFormat, Utc};
use tracing::warn;

use crate::storage::ConfigFs;

/// Size-bounded save journal kept next to the configuration files.
///
/// When an append would push the file past `max_bytes`, the oldest half of
/// the lines is dropped first.
#[derive(Debug, Clone)]
pub struct SaveJournal {
    name: String,
    max_bytes: usize,
}

impl SaveJournal {
    /// Journal stored in file `name`, compacted past `max_bytes`.
    pub fn new(name: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            name: name.into(),
            max_bytes,
        }
    }

    /// Append one timestamped line. Failures are logged, never returned.
    pub fn record<F: ConfigFs + ?Sized>(&self, fs: &mut F, message: &str) {
        let line = format!(
            "[{}] {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message
        );

        let current = fs.size(&self.name).unwrap_or(0) as usize;
        if self.max_bytes > 0 && current + line.len() > self.max_bytes {
            if let Err(e) = self.compact(fs, line.len()) {
                warn!("Failed to compact save journal {}: {}", self.name, e);
            }
        }

        if let Err(e) = fs.append(&self.name, line.as_bytes()) {
            warn!("Failed to append save journal {}: {}", self.name, e);
        }
    }

    /// Recent lines, oldest first.
    pub fn lines<F: ConfigFs + ?Sized>(&self, fs: &mut F) -> Vec<String> {
        fs.read(&self.name)
            .map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn compact<F: ConfigFs + ?Sized>(&self, fs: &mut F, incoming: usize) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(&fs.read(&self.name)?).into_owned();
        let lines: Vec<&str> = text.lines().collect();
        let budget = (self.max_bytes / 2).saturating_sub(incoming);

        let mut kept: Vec<&str> = Vec::new();
        let mut used = 0;
        for line in lines.iter().rev() {
            if used + line.len() + 1 > budget {
                break;
            }
            used += line.len() + 1;
            kept.push(line);
        }
        kept.reverse();

        let mut out = kept.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        fs.write(&self.name, out.as_bytes())?;
        Ok(())
    }
}
