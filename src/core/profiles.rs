/*
 * This module is responsible for the local copy of user profiles. The profile
 * service writes every successfully fetched or updated profile through to this
 * storage, and the CLI reads it back to show the last known state without
 * touching the network. Profiles are stored as pretty-printed JSON files named
 * after the profile id, inside a "profiles" subfolder of the storage root
 * (by default the per-user data directory, see `path_utils`).
 *
 * It includes a trait for storage operations (`ProfileStorageOperations`) to
 * facilitate testing and dependency injection, and a concrete implementation
 * (`CoreProfileStorage`). There are no transactions and no schema versioning:
 * a save fully replaces whatever was stored for that id.
 */
use super::models::{Profile, ProfileId};
use serde_json;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const PROFILE_FILE_EXTENSION: &str = "json";
const PROFILES_SUBFOLDER_NAME: &str = "profiles";

#[derive(Debug)]
pub enum ProfileError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoStorageDirectory,
    InvalidProfileId(String),
}

impl From<io::Error> for ProfileError {
    fn from(err: io::Error) -> Self {
        ProfileError::Io(err)
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        ProfileError::Serde(err)
    }
}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileError::Io(e) => write!(f, "I/O error: {e}"),
            ProfileError::Serde(e) => write!(f, "Serialization/Deserialization error: {e}"),
            ProfileError::NoStorageDirectory => {
                write!(f, "Could not determine storage directory for profiles")
            }
            ProfileError::InvalidProfileId(id) => write!(
                f,
                "Stored profile id does not match its file: {id}"
            ),
        }
    }
}

impl std::error::Error for ProfileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProfileError::Io(e) => Some(e),
            ProfileError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProfileError>;

pub trait ProfileStorageOperations: Send + Sync {
    fn save_profile(&self, profile: &Profile) -> Result<()>;
    // `Ok(None)` means nothing has been stored for this id yet.
    fn load_profile(&self, id: &ProfileId) -> Result<Option<Profile>>;
}

pub struct CoreProfileStorage {
    root: PathBuf,
}

impl CoreProfileStorage {
    pub fn new(root: PathBuf) -> Self {
        CoreProfileStorage { root }
    }

    /*
     * Ensures the profile storage directory exists under `<root>/profiles`.
     * Returns `None` if it could not be created; the error is logged.
     */
    fn get_profile_storage_dir_impl(root: &Path) -> Option<PathBuf> {
        let profiles_path = root.join(PROFILES_SUBFOLDER_NAME);
        if !profiles_path.exists() {
            if let Err(e) = fs::create_dir_all(&profiles_path) {
                log::error!(
                    "CoreProfileStorage: Failed to create profile storage directory {profiles_path:?}: {e}"
                );
                return None;
            }
            log::debug!("CoreProfileStorage: Created profile storage directory: {profiles_path:?}");
        } else {
            log::trace!(
                "CoreProfileStorage: Profile storage directory already exists: {profiles_path:?}"
            );
        }

        Some(profiles_path)
    }

    fn profile_file_path(&self, id: &ProfileId) -> Result<PathBuf> {
        let dir = CoreProfileStorage::get_profile_storage_dir_impl(&self.root)
            .ok_or(ProfileError::NoStorageDirectory)?;
        Ok(dir.join(format!("{id}.{PROFILE_FILE_EXTENSION}")))
    }
}

impl ProfileStorageOperations for CoreProfileStorage {
    /*
     * Writes the profile to `<root>/profiles/<id>.json`, replacing any previous
     * copy. The file is written next to its destination and renamed into place
     * so a reader never observes a half-written profile.
     */
    fn save_profile(&self, profile: &Profile) -> Result<()> {
        log::trace!("CoreProfileStorage: Saving profile '{}'", profile.id);
        let file_path = self.profile_file_path(&profile.id)?;
        let tmp_path = file_path.with_extension(format!("{PROFILE_FILE_EXTENSION}.tmp"));

        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, profile)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &file_path)?;
        log::debug!(
            "CoreProfileStorage: Successfully saved profile '{}' to {:?}.",
            profile.id,
            file_path
        );
        Ok(())
    }

    fn load_profile(&self, id: &ProfileId) -> Result<Option<Profile>> {
        log::trace!("CoreProfileStorage: Loading profile '{id}'");
        let file_path = self.profile_file_path(id)?;

        if !file_path.exists() {
            log::debug!("CoreProfileStorage: No stored profile for '{id}' at {file_path:?}.");
            return Ok(None);
        }

        let file = File::open(&file_path)?;
        let reader = BufReader::new(file);
        let profile: Profile = serde_json::from_reader(reader)?;
        if &profile.id != id {
            log::error!(
                "CoreProfileStorage: File {file_path:?} holds profile '{}', expected '{id}'.",
                profile.id
            );
            return Err(ProfileError::InvalidProfileId(profile.id.to_string()));
        }
        log::debug!(
            "CoreProfileStorage: Successfully loaded profile '{}' from {:?}.",
            profile.id,
            file_path
        );
        Ok(Some(profile))
    }
}
