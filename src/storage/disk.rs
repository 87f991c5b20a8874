use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ConfigFs;

/// Configuration files in a host directory.
///
/// Writes go through a `.tmp` sibling that is renamed over the target, so a
/// crash mid-write leaves either the old or the new file.
#[derive(Debug, Clone)]
pub struct DiskFs {
    root: PathBuf,
}

impl DiskFs {
    /// Open (and create if needed) a store directory.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, name: &str) -> io::Result<PathBuf> {
        let candidate = Path::new(name);
        if name.is_empty()
            || candidate.is_absolute()
            || candidate.components().count() != 1
            || name == ".."
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file name '{}'", name),
            ));
        }
        Ok(self.root.join(candidate))
    }
}

impl ConfigFs for DiskFs {
    fn read(&mut self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path(name)?)
    }

    fn write(&mut self, name: &str, data: &[u8]) -> io::Result<usize> {
        let target = self.path(name)?;
        let tmp = self.path(&format!("{}.tmp", name))?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        debug!("Wrote {} bytes to {}", data.len(), target.display());
        Ok(data.len())
    }

    fn append(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name)?)?;
        file.write_all(data)
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn size(&self, name: &str) -> Option<u64> {
        let path = self.path(name).ok()?;
        fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        fs::remove_file(self.path(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let mut fs = DiskFs::open(dir.path().join("store")).unwrap();

        assert!(!fs.exists("io_config.json"));
        assert_eq!(fs.write("io_config.json", b"{}").unwrap(), 2);
        assert!(fs.exists("io_config.json"));
        assert!(!fs.exists("io_config.json.tmp"));
        assert_eq!(fs.read("io_config.json").unwrap(), b"{}");
        assert_eq!(fs.size("io_config.json"), Some(2));

        fs.remove("io_config.json").unwrap();
        assert!(!fs.exists("io_config.json"));
        assert_eq!(
            fs.read("io_config.json").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_append_creates_file() {
        let dir = TempDir::new().unwrap();
        let mut fs = DiskFs::open(dir.path()).unwrap();
        fs.append("config_save.log", b"a\n").unwrap();
        fs.append("config_save.log", b"b\n").unwrap();
        assert_eq!(fs.read("config_save.log").unwrap(), b"a\nb\n");
    }

    #[test]
    fn test_rejects_paths_outside_root() {
        let dir = TempDir::new().unwrap();
        let mut fs = DiskFs::open(dir.path()).unwrap();
        assert!(fs.write("../escape.json", b"{}").is_err());
        assert!(fs.write("/etc/passwd", b"x").is_err());
        assert!(!fs.exists(".."));
    }
}
