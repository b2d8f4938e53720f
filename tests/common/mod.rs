use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary data root for CLI tests.
pub struct TestRoot {
    pub dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Initialize duende in this root.
    pub fn duende_init(&self) {
        let output = std::process::Command::new(Self::duende_bin())
            .arg("init")
            .arg(self.path())
            .output()
            .expect("duende init failed");
        assert!(
            output.status.success(),
            "init failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Return the path to the duende binary (built via cargo).
    pub fn duende_bin() -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_duende"))
    }
}
