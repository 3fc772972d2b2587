/*
 * This module provides utility functions for retrieving and ensuring the
 * existence of the application's per-user directories: the configuration
 * directory (config file, last used profile id) and the data directory
 * (cached profiles).
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

fn ensure_dir(path: &Path, what: &str) -> Option<PathBuf> {
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path) {
            log::error!("PathUtils: Failed to create {what} directory {path:?}: {e}");
            return None;
        }
        log::debug!("PathUtils: Created {what} directory: {path:?}");
    } else {
        log::trace!("PathUtils: {what} directory already exists: {path:?}");
    }
    Some(path.to_path_buf())
}

/*
 * Retrieves the application's local (non-roaming) configuration directory,
 * creating it if necessary. Returns `None` if the platform offers no home
 * directory or the directory could not be created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name)
        .and_then(|proj_dirs| ensure_dir(proj_dirs.config_local_dir(), "config"))
}

// Same as above for the local data directory, where the profile cache lives.
pub fn get_base_app_data_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app data local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name)
        .and_then(|proj_dirs| ensure_dir(proj_dirs.data_local_dir(), "data"))
}
