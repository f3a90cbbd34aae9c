//! Transient local copies of attachment bytes.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{RelayError, Result};

/// An attachment written to the scratch directory.
///
/// The file is fully written, synced and closed before `persist` returns.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    size: u64,
}

impl ScratchFile {
    /// Write `bytes` to a new file in `dir` named after `name`.
    ///
    /// Existing files are never touched: if `dir/<name>` is taken (a copy
    /// kept after a failed upload, say) a numeric suffix is added.
    pub fn persist(dir: &Path, name: &str, bytes: &[u8]) -> Result<Self> {
        let (path, mut file) = create_unique(dir, &scratch_name(name))?;
        file.write_all(bytes).map_err(|e| RelayError::io(&path, e))?;
        file.sync_all().map_err(|e| RelayError::io(&path, e))?;
        drop(file);

        Ok(Self {
            path,
            size: bytes.len() as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the file. Only call once its contents are safely stored.
    pub fn remove(self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| RelayError::io(&self.path, e))
    }

    /// Give up ownership and keep the file on disk.
    pub fn keep(self) -> PathBuf {
        self.path
    }
}

/// Create `dir/<name>`, or `dir/<stem>_<n>.<ext>` for the first free `n`.
fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    for i in 0..1000u32 {
        let path = match (i, ext) {
            (0, _) => dir.join(name),
            (_, Some(ext)) => dir.join(format!("{stem}_{i}.{ext}")),
            (_, None) => dir.join(format!("{stem}_{i}")),
        };
        match File::options().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(RelayError::io(&path, e)),
        }
    }

    let path = dir.join(name);
    Err(RelayError::io(
        &path,
        std::io::Error::new(ErrorKind::AlreadyExists, "no free scratch filename"),
    ))
}

/// Reduce a filename to a single safe path component.
///
/// Replaces separators and control characters with `_`.
fn scratch_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == ':' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => "unknown".to_string(),
        _ => sanitized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_name() {
        assert_eq!(scratch_name("a_KEY_02-Sep-2018.csv"), "a_KEY_02-Sep-2018.csv");
        assert_eq!(scratch_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(scratch_name(".."), "unknown");
        assert_eq!(scratch_name(""), "unknown");
    }

    #[test]
    fn test_persist_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFile::persist(dir.path(), "x_KEY.csv", b"1,2\n").unwrap();
        assert_eq!(scratch.size(), 4);
        assert_eq!(fs::read(scratch.path()).unwrap(), b"1,2\n");

        let path = scratch.path().to_path_buf();
        scratch.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_persist_never_overwrites_kept_file() {
        let dir = tempfile::tempdir().unwrap();
        let kept = ScratchFile::persist(dir.path(), "same.csv", b"old contents")
            .unwrap()
            .keep();

        let second = ScratchFile::persist(dir.path(), "same.csv", b"new").unwrap();
        assert_eq!(second.path(), dir.path().join("same_1.csv"));
        assert_eq!(fs::read(second.path()).unwrap(), b"new");

        let third = ScratchFile::persist(dir.path(), "same.csv", b"newer").unwrap();
        assert_eq!(third.path(), dir.path().join("same_2.csv"));

        second.remove().unwrap();
        assert_eq!(fs::read(&kept).unwrap(), b"old contents");
    }

    #[test]
    fn test_persist_suffix_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        ScratchFile::persist(dir.path(), "README", b"a").unwrap().keep();
        let scratch = ScratchFile::persist(dir.path(), "README", b"b").unwrap();
        assert_eq!(scratch.path(), dir.path().join("README_1"));
    }

    #[test]
    fn test_persist_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = ScratchFile::persist(&missing, "a.csv", b"x").unwrap_err();
        assert!(matches!(err, RelayError::Io { .. }));
    }
}
