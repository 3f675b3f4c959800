use super::write_atomic;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const IDENTITY_FILE_NAME: &str = "identity.bin";
const IDENTITY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub install_id: Uuid,
    pub user_id: Uuid,
}

/// Install and user ids, stored as two GUIDs back to back.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

/// Maps a numeric user id into the 128-bit id space: eight zero bytes
/// followed by the little-endian value.
pub fn numeric_user_id(uid: u64) -> Uuid {
    let mut raw = [0u8; 16];
    raw[8..].copy_from_slice(&uid.to_le_bytes());
    Uuid::from_bytes_le(raw)
}

impl IdentityStore {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            path: work_dir.join(IDENTITY_FILE_NAME),
        }
    }

    fn read(&self) -> Option<Identity> {
        let data = fs::read(&self.path).ok()?;
        let install: [u8; 16] = data.get(..16)?.try_into().ok()?;
        let user: [u8; 16] = data.get(16..IDENTITY_LEN)?.try_into().ok()?;
        Some(Identity {
            install_id: Uuid::from_bytes_le(install),
            user_id: Uuid::from_bytes_le(user),
        })
    }

    fn write(&self, identity: &Identity) -> io::Result<()> {
        let mut data = Vec::with_capacity(IDENTITY_LEN);
        data.extend_from_slice(&identity.install_id.to_bytes_le());
        data.extend_from_slice(&identity.user_id.to_bytes_le());
        write_atomic(&self.path, &data)
    }

    /// Returns the stored ids, or mints a fresh install id (nil user) when
    /// the file is missing or short.
    pub fn load_or_init(&self) -> Identity {
        if let Some(identity) = self.read() {
            return identity;
        }

        let identity = Identity {
            install_id: Uuid::new_v4(),
            user_id: Uuid::nil(),
        };
        if let Err(e) = self.write(&identity) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to save identity");
        }
        identity
    }

    pub fn save_user_id(&self, user_id: Uuid) -> io::Result<()> {
        let mut identity = self.load_or_init();
        identity.user_id = user_id;
        self.write(&identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_install_id_is_stable() {
        let dir = TempDir::new().unwrap();
        let store = IdentityStore::new(dir.path());
        let first = store.load_or_init();
        assert!(first.user_id.is_nil());
        assert_eq!(store.load_or_init(), first);

        let user = Uuid::new_v4();
        store.save_user_id(user).unwrap();
        let reloaded = store.load_or_init();
        assert_eq!(reloaded.install_id, first.install_id);
        assert_eq!(reloaded.user_id, user);
    }

    #[test]
    fn test_short_file_is_reinitialised() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(IDENTITY_FILE_NAME), [1u8; 20]).unwrap();

        let identity = IdentityStore::new(dir.path()).load_or_init();
        assert!(identity.user_id.is_nil());
        assert_eq!(fs::read(dir.path().join(IDENTITY_FILE_NAME)).unwrap().len(), 32);
    }

    #[test]
    fn test_numeric_user_id_layout() {
        let id = numeric_user_id(0x0102_0304_0506_0708);
        let bytes = id.to_bytes_le();
        assert_eq!(&bytes[..8], &[0; 8]);
        assert_eq!(&bytes[8..], &[8, 7, 6, 5, 4, 3, 2, 1]);
    }
}
