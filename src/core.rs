/*
 * This module consolidates the core, UI-agnostic logic of the application.
 * It re-exports the profile model, the remote and local storage abstractions
 * (`ProfileRemoteOperations`, `ProfileStorageOperations`,
 * `ConfigManagerOperations`), the `ProfileService` that ties them together,
 * and the callback-style `ProfileClient` that delivers service results on the
 * main queue.
 */
pub mod config;
pub mod main_queue;
pub mod models;
pub mod path_utils;
pub mod profile_client;
pub mod profile_service;
pub mod profiles;
pub mod remote;
pub mod request_handle;
pub mod write_sequencer;

#[cfg(test)]
pub(crate) mod test_fakes;

// Re-export the data model
pub use models::{Profile, ProfileEdit, ProfileId};

// Re-export profile storage related items
pub use profiles::{CoreProfileStorage, ProfileStorageOperations};

// Re-export remote related items
pub use remote::{HttpProfileRemote, ProfileRemoteOperations};

// Re-export config related items
pub use config::{AppConfig, ConfigManagerOperations, CoreConfigManager, LoggingConfig};

pub use profile_service::{ProfileService, ServiceResult};

pub use main_queue::MainQueue;
pub use profile_client::ProfileClient;
pub use request_handle::RequestHandle;
