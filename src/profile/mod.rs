//! Small per-install files that live next to the queue.

pub mod identity;
pub mod milestones;
pub mod test_user;

pub use identity::{IDENTITY_FILE_NAME, Identity, IdentityStore, numeric_user_id};
pub use milestones::{MILESTONE_FILE_NAME, MilestoneCounter};
pub use test_user::{TEST_USER_FILE_NAME, TestUserMarker};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let result = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
