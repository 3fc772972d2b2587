/*
 * The profile service: fetch a profile from the remote, write it through to
 * local storage, return it. Updates go the same way with a full-resource
 * replace. This is the only place that decides when the local copy changes:
 * the cache is written only after a successful remote read or write, never on
 * failure and never on its own.
 *
 * Concurrency rules:
 * - Loads are single-flight per id. Concurrent callers share one remote
 *   request and all receive its result. If the leading caller is dropped, the
 *   waiters retry and one of them leads.
 * - Remote writes are serialized per id.
 * - Cache writes are ordered per id by `WriteSequencer`; a response to an
 *   older request never overwrites a newer one.
 * - Every remote call is bounded by the configured timeout.
 *
 * `update_profile` keeps full-replace semantics: two updates built from the
 * same stale copy both succeed and the later one wins entirely.
 * `toggle_like`/`modify_profile` read the current profile under the per-id
 * lock before writing, so mutations issued through them do not get lost.
 */
use super::models::{Profile, ProfileId};
use super::profiles::{ProfileError, ProfileStorageOperations};
use super::remote::{self, ProfileRemoteOperations, RemoteError};
use super::write_sequencer::{WriteSequencer, WriteTicket};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum ServiceError {
    Remote(Arc<RemoteError>),
    Timeout(Duration),
    Storage(Arc<ProfileError>),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Remote(e) => write!(f, "Remote operation failed: {e}"),
            ServiceError::Timeout(after) => {
                write!(f, "Remote operation timed out after {} ms", after.as_millis())
            }
            ServiceError::Storage(e) => write!(f, "Local profile storage failed: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Remote(e) => Some(e.as_ref()),
            ServiceError::Storage(e) => Some(e.as_ref()),
            ServiceError::Timeout(_) => None,
        }
    }
}

impl From<RemoteError> for ServiceError {
    fn from(err: RemoteError) -> Self {
        ServiceError::Remote(Arc::new(err))
    }
}

impl From<ProfileError> for ServiceError {
    fn from(err: ProfileError) -> Self {
        ServiceError::Storage(Arc::new(err))
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

type InFlightLoads = Mutex<HashMap<ProfileId, broadcast::Sender<ServiceResult<Profile>>>>;

enum LoadRole {
    Leader,
    Follower(broadcast::Receiver<ServiceResult<Profile>>),
}

/*
 * Removes the in-flight entry of a leading load when dropped, unless `finish`
 * already did. Dropping the sender wakes the followers with `Closed`, which
 * makes them retry.
 */
struct InFlightGuard<'a> {
    loads: &'a InFlightLoads,
    id: &'a ProfileId,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn finish(mut self) -> Option<broadcast::Sender<ServiceResult<Profile>>> {
        self.armed = false;
        lock_loads(self.loads).remove(self.id)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!(
                "ProfileService: Leading load for '{}' dropped before completion.",
                self.id
            );
            lock_loads(self.loads).remove(self.id);
        }
    }
}

fn lock_loads(
    loads: &InFlightLoads,
) -> std::sync::MutexGuard<'_, HashMap<ProfileId, broadcast::Sender<ServiceResult<Profile>>>> {
    loads.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct ProfileService {
    remote: Arc<dyn ProfileRemoteOperations>,
    storage: Arc<dyn ProfileStorageOperations>,
    request_timeout: Duration,
    in_flight_loads: InFlightLoads,
    sequencer: WriteSequencer,
}

impl ProfileService {
    pub fn new(
        remote: Arc<dyn ProfileRemoteOperations>,
        storage: Arc<dyn ProfileStorageOperations>,
        request_timeout: Duration,
    ) -> Self {
        log::debug!(
            "ProfileService::new called with request timeout {} ms.",
            request_timeout.as_millis()
        );
        ProfileService {
            remote,
            storage,
            request_timeout,
            in_flight_loads: Mutex::new(HashMap::new()),
            sequencer: WriteSequencer::new(),
        }
    }

    /*
     * Fetches the profile from the remote and writes it to local storage.
     * On failure nothing is written and the error is returned as-is.
     */
    pub async fn load_profile(&self, id: &ProfileId) -> ServiceResult<Profile> {
        loop {
            match self.join_or_lead(id) {
                LoadRole::Follower(mut receiver) => match receiver.recv().await {
                    Ok(result) => {
                        log::trace!("ProfileService: Shared in-flight load result for '{id}'.");
                        return result;
                    }
                    Err(_) => {
                        log::debug!("ProfileService: In-flight load for '{id}' went away, retrying.");
                    }
                },
                LoadRole::Leader => {
                    let guard = InFlightGuard {
                        loads: &self.in_flight_loads,
                        id,
                        armed: true,
                    };
                    let result = self.fetch_and_store(id).await;
                    if let Some(sender) = guard.finish() {
                        // No receivers is fine: nobody joined this load.
                        let _ = sender.send(result.clone());
                    }
                    return result;
                }
            }
        }
    }

    fn join_or_lead(&self, id: &ProfileId) -> LoadRole {
        let mut loads = lock_loads(&self.in_flight_loads);
        if let Some(sender) = loads.get(id) {
            return LoadRole::Follower(sender.subscribe());
        }
        let (sender, _) = broadcast::channel(1);
        loads.insert(id.clone(), sender);
        LoadRole::Leader
    }

    async fn fetch_and_store(&self, id: &ProfileId) -> ServiceResult<Profile> {
        log::debug!("ProfileService: Loading profile '{id}' from remote.");
        let ticket = self.sequencer.issue_load(id);
        let profile = self.fetch_remote(id).await?;
        self.write_through(&ticket, &profile);
        log::info!("ProfileService: Loaded profile '{id}'.");
        Ok(profile)
    }

    /*
     * Replaces the whole remote profile with `profile` and writes the returned
     * profile to local storage. Storage is untouched on failure. The stored
     * copy wins over any load that overlapped this update.
     */
    pub async fn update_profile(&self, profile: Profile) -> ServiceResult<Profile> {
        let _serialized = self.sequencer.lock_updates(&profile.id).await;
        self.put_and_store(&profile).await
    }

    // Reads the current remote profile, applies `mutate`, and writes it back,
    // all under the per-id update lock.
    pub async fn modify_profile<F>(&self, id: &ProfileId, mutate: F) -> ServiceResult<Profile>
    where
        F: FnOnce(&mut Profile) + Send,
    {
        let _serialized = self.sequencer.lock_updates(id).await;
        let mut current = self.fetch_remote(id).await?;
        mutate(&mut current);
        self.put_and_store(&current).await
    }

    pub async fn toggle_like(&self, id: &ProfileId, nft_id: &str) -> ServiceResult<Profile> {
        let nft_id = nft_id.to_string();
        self.modify_profile(id, move |profile| {
            let liked = profile.toggle_like(&nft_id);
            log::debug!("ProfileService: NFT '{nft_id}' liked={liked} for profile '{}'.", profile.id);
        })
        .await
    }

    // The locally stored copy, without any remote call.
    pub fn cached_profile(&self, id: &ProfileId) -> ServiceResult<Option<Profile>> {
        Ok(self.storage.load_profile(id)?)
    }

    async fn put_and_store(&self, profile: &Profile) -> ServiceResult<Profile> {
        log::debug!("ProfileService: Writing profile '{}' to remote.", profile.id);
        let ticket = self.sequencer.issue_update(&profile.id);
        let stored = self
            .with_timeout(self.remote.put_profile(profile))
            .await
            .and_then(|returned| Self::check_id(&profile.id, returned))?;
        self.write_through(&ticket, &stored);
        log::info!("ProfileService: Updated profile '{}'.", profile.id);
        Ok(stored)
    }

    async fn fetch_remote(&self, id: &ProfileId) -> ServiceResult<Profile> {
        let fetched = self.with_timeout(self.remote.fetch_profile(id)).await?;
        Self::check_id(id, fetched)
    }

    fn check_id(requested: &ProfileId, profile: Profile) -> ServiceResult<Profile> {
        if &profile.id != requested {
            log::warn!(
                "ProfileService: Remote answered with profile '{}' for '{requested}'.",
                profile.id
            );
            return Err(RemoteError::IdMismatch {
                requested: requested.clone(),
                received: profile.id,
            }
            .into());
        }
        Ok(profile)
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = remote::Result<T>>,
    ) -> ServiceResult<T> {
        match tokio::time::timeout(self.request_timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                log::warn!("ProfileService: Remote operation failed: {e}");
                Err(e.into())
            }
            Err(_) => {
                log::warn!(
                    "ProfileService: Remote operation timed out after {} ms.",
                    self.request_timeout.as_millis()
                );
                Err(ServiceError::Timeout(self.request_timeout))
            }
        }
    }

    /*
     * A storage failure here is logged and swallowed: the remote call
     * succeeded and its result is what the caller gets. The cache stays at its
     * previous value.
     */
    fn write_through(&self, ticket: &WriteTicket<'_>, profile: &Profile) {
        match self
            .sequencer
            .commit_if_latest(ticket, || self.storage.save_profile(profile))
        {
            Some(Ok(())) => {
                log::trace!("ProfileService: Cached profile '{}'.", profile.id);
            }
            Some(Err(e)) => {
                log::error!(
                    "ProfileService: Failed to cache profile '{}': {e}",
                    profile.id
                );
            }
            None => {}
        }
    }
}
