//! Test utilities for scratch output files.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct TempOutput {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempOutput {
    /// A path inside a fresh temporary directory. The file itself is not created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("output.bin");

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// A temporary file pre-filled with `content`
    pub fn with_content(content: &[u8]) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        let mut file = File::create(&temp_file.path)?;
        file.write_all(content)?;
        file.flush()?;
        Ok(temp_file)
    }

    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_output_is_not_created_up_front() {
        let temp_file = TempOutput::new().unwrap();
        assert!(!temp_file.path().exists());
        assert!(temp_file.path().parent().unwrap().exists());
    }

    #[test]
    fn test_temp_output_with_content() {
        let temp_file = TempOutput::with_content(b"test bytes").unwrap();
        assert_eq!(temp_file.read().unwrap(), b"test bytes");
    }
}
