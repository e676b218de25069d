//! L4: the volume registry mapping a logical device name (`DK:`, `SY:`,
//! an assigned alias) to a mounted filesystem. Ported from `xferx/volumes.py`'s
//! `Volumes` class: `DK` is the default storage volume, `SY` the system
//! volume, and logical names are just aliases resolved through one
//! level of indirection before reaching the volume table.

use std::collections::HashMap;

use xferx_core::{Filesystem, FsError, FsResult};

pub const DEFAULT_VOLUME: &str = "DK";
pub const SYSTEM_VOLUME: &str = "SY";

/// Strips a trailing `:` and upper-cases a volume identifier, the way
/// every shell command accepts `dk:`, `DK:`, or bare `dk` interchangeably.
pub fn canonical_volume(volume_id: &str) -> String {
    let upper = volume_id.to_ascii_uppercase();
    upper.strip_suffix(':').map(str::to_owned).unwrap_or(upper)
}

/// Splits `"DK:FOO.TXT"` into `(Some("DK"), "FOO.TXT")`, or `(None, path)`
/// if `path` carries no volume prefix.
pub fn splitdrive(path: &str) -> (Option<&str>, &str) {
    match path.split_once(':') {
        Some((drive, rest)) if !drive.is_empty() && !drive.contains('/') => (Some(drive), rest),
        _ => (None, path),
    }
}

pub struct Volumes {
    volumes: HashMap<String, Box<dyn Filesystem>>,
    logical: HashMap<String, String>,
    default_device: String,
}

impl Volumes {
    pub fn new() -> Self {
        Self {
            volumes: HashMap::new(),
            logical: HashMap::new(),
            default_device: SYSTEM_VOLUME.to_string(),
        }
    }

    /// Mounts an already-opened filesystem under `logical`, replacing
    /// any prior volume at that name.
    pub fn mount(&mut self, logical: &str, filesystem: Box<dyn Filesystem>) -> FsResult<()> {
        let logical = canonical_volume(logical);
        if logical == DEFAULT_VOLUME || logical.is_empty() {
            return Err(FsError::Invalid(format!("illegal volume {logical}:")));
        }
        self.volumes.insert(logical, filesystem);
        Ok(())
    }

    pub fn dismount(&mut self, volume_id: &str) -> FsResult<()> {
        let volume_id = canonical_volume(volume_id);
        if volume_id == DEFAULT_VOLUME {
            return Err(FsError::Invalid(format!("illegal volume {volume_id}:")));
        }
        let resolved = self.logical.get(&volume_id).cloned().unwrap_or(volume_id.clone());
        if self.volumes.remove(&resolved).is_none() {
            return Err(FsError::NotFound(format!("{volume_id}:")));
        }
        self.logical.retain(|_, target| target != &resolved);
        Ok(())
    }

    pub fn assign(&mut self, volume_id: &str, logical: &str) -> FsResult<()> {
        let volume_id = canonical_volume(volume_id);
        let volume_id = self.logical.get(&volume_id).cloned().unwrap_or(volume_id);
        let logical = canonical_volume(logical);
        if logical == DEFAULT_VOLUME {
            self.set_default_volume(&volume_id)
        } else {
            if !self.volumes.contains_key(&volume_id) {
                return Err(FsError::NotFound(format!("{volume_id}:")));
            }
            self.logical.insert(logical, volume_id);
            Ok(())
        }
    }

    pub fn deassign(&mut self, volume_id: &str) -> FsResult<()> {
        let volume_id = canonical_volume(volume_id);
        if volume_id == DEFAULT_VOLUME || !self.logical.contains_key(&volume_id) {
            return Err(FsError::NotFound(format!("logical name not found {volume_id}:")));
        }
        self.logical.remove(&volume_id);
        Ok(())
    }

    pub fn set_default_volume(&mut self, volume_id: &str) -> FsResult<()> {
        let volume_id = canonical_volume(volume_id);
        if volume_id != DEFAULT_VOLUME {
            if !self.volumes.contains_key(&volume_id) {
                return Err(FsError::NotFound(format!("{volume_id}:")));
            }
            self.default_device = volume_id;
        }
        Ok(())
    }

    fn resolve(&self, volume_id: &str) -> String {
        let mut volume_id = canonical_volume(volume_id);
        if volume_id == DEFAULT_VOLUME {
            volume_id = self.default_device.clone();
        }
        self.logical.get(&volume_id).cloned().unwrap_or(volume_id)
    }

    pub fn get(&self, volume_id: &str) -> FsResult<&dyn Filesystem> {
        let resolved = self.resolve(volume_id);
        self.volumes
            .get(&resolved)
            .map(|fs| fs.as_ref())
            .ok_or_else(|| FsError::NotFound(format!("illegal volume {volume_id}:")))
    }

    pub fn get_mut(&mut self, volume_id: &str) -> FsResult<&mut dyn Filesystem> {
        let resolved = self.resolve(volume_id);
        self.volumes
            .get_mut(&resolved)
            .map(|fs| fs.as_mut())
            .ok_or_else(|| FsError::NotFound(format!("illegal volume {volume_id}:")))
    }

    pub fn chdir(&mut self, path: &str) -> bool {
        let (drive, rest) = splitdrive(path);
        let volume_id = drive.map(canonical_volume).unwrap_or_else(|| self.default_device.clone());
        let Ok(fs) = self.get_mut(&volume_id) else {
            return false;
        };
        if !rest.is_empty() && !fs.chdir(rest) {
            return false;
        }
        if drive.is_some() && volume_id != DEFAULT_VOLUME {
            let _ = self.set_default_volume(&volume_id);
        }
        true
    }

    pub fn get_pwd(&self) -> String {
        match self.get(&self.default_device) {
            Ok(fs) => format!("{}:{}", self.default_device, fs.get_pwd()),
            Err(_) => format!("{}:???", self.default_device),
        }
    }
}

impl Default for Volumes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xferx_core::{DirectoryEntry, File, FileMode};

    struct StubFs {
        name: String,
    }

    impl Filesystem for StubFs {
        fn volume_name(&self) -> &str {
            &self.name
        }
        fn is_read_only(&self) -> bool {
            true
        }
        fn list(&mut self, _directory: &str) -> FsResult<Vec<DirectoryEntry>> {
            Ok(Vec::new())
        }
        fn exists(&mut self, _path: &str) -> FsResult<bool> {
            Ok(false)
        }
        fn open(&mut self, path: &str) -> FsResult<Box<dyn File + '_>> {
            Err(FsError::NotFound(path.to_string()))
        }
        fn create(&mut self, path: &str, _mode: FileMode) -> FsResult<Box<dyn File + '_>> {
            let _ = path;
            Err(FsError::ReadOnly)
        }
        fn remove(&mut self, _path: &str) -> FsResult<()> {
            Err(FsError::ReadOnly)
        }
        fn free_space(&mut self) -> FsResult<Option<u64>> {
            Ok(None)
        }
    }

    #[test]
    fn splitdrive_separates_volume_prefix() {
        assert_eq!(splitdrive("DK:FOO.TXT"), (Some("DK"), "FOO.TXT"));
        assert_eq!(splitdrive("FOO.TXT"), (None, "FOO.TXT"));
    }

    #[test]
    fn mount_and_get_round_trip() {
        let mut volumes = Volumes::new();
        volumes
            .mount("DK", Box::new(StubFs { name: "DK".into() }))
            .unwrap();
        assert_eq!(volumes.get("DK").unwrap().volume_name(), "DK");
        assert_eq!(volumes.get("dk:").unwrap().volume_name(), "DK");
    }

    #[test]
    fn assign_creates_a_logical_alias() {
        let mut volumes = Volumes::new();
        volumes
            .mount("DU0", Box::new(StubFs { name: "DU0".into() }))
            .unwrap();
        volumes.assign("DU0", "X").unwrap();
        assert_eq!(volumes.get("X:").unwrap().volume_name(), "DU0");
    }

    #[test]
    fn dismount_removes_the_volume() {
        let mut volumes = Volumes::new();
        volumes
            .mount("DK", Box::new(StubFs { name: "DK".into() }))
            .unwrap();
        volumes.dismount("DK").unwrap();
        assert!(volumes.get("DK").is_err());
    }
}
