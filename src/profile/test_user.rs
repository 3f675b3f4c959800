use super::write_atomic;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

pub const TEST_USER_FILE_NAME: &str = "test_user.info";

/// Marks this install as a tester; the name is sent with every batch.
#[derive(Debug, Clone)]
pub struct TestUserMarker {
    path: PathBuf,
}

impl TestUserMarker {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            path: work_dir.join(TEST_USER_FILE_NAME),
        }
    }

    pub fn read(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(name) => Some(name),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read test user marker");
                None
            }
        }
    }

    pub fn write(&self, name: &str) -> io::Result<()> {
        write_atomic(&self.path, name.as_bytes())
    }
}
