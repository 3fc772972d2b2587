/*
 * Test doubles shared by the service, client and presenter tests: a fake
 * remote server with full-replace semantics and an in-memory profile storage.
 * Both record what reached them.
 */
use super::models::{Profile, ProfileId};
use super::profiles::{ProfileError, ProfileStorageOperations};
use super::remote::{ProfileRemoteOperations, RemoteError};

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// --- FakeRemote ---
pub(crate) struct FakeRemote {
    pub(crate) server_state: Mutex<HashMap<ProfileId, Profile>>,
    pub(crate) fetch_calls: AtomicUsize,
    pub(crate) put_requests: Mutex<Vec<Profile>>,
    pub(crate) fail_requests: AtomicBool,
    pub(crate) hang_requests: AtomicBool,
    // When set, fetches snapshot the server state, then wait for a permit before answering.
    pub(crate) fetch_gate: Mutex<Option<Arc<Notify>>>,
    // When set, writes wait for a permit before the server applies them.
    pub(crate) put_gate: Mutex<Option<Arc<Notify>>>,
    // Overrides the id of fetched profiles, to simulate a misbehaving server.
    pub(crate) answer_with_id: Mutex<Option<ProfileId>>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        FakeRemote {
            server_state: Mutex::new(HashMap::new()),
            fetch_calls: AtomicUsize::new(0),
            put_requests: Mutex::new(Vec::new()),
            fail_requests: AtomicBool::new(false),
            hang_requests: AtomicBool::new(false),
            fetch_gate: Mutex::new(None),
            put_gate: Mutex::new(None),
            answer_with_id: Mutex::new(None),
        }
    }

    pub(crate) fn with_profile(profile: Profile) -> Self {
        let remote = Self::new();
        remote.set_server_profile(profile);
        remote
    }

    pub(crate) fn set_server_profile(&self, profile: Profile) {
        self.server_state
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    pub(crate) fn server_profile(&self, id: &ProfileId) -> Option<Profile> {
        self.server_state.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.fail_requests.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_hanging(&self, hanging: bool) {
        self.hang_requests.store(hanging, Ordering::SeqCst);
    }

    pub(crate) fn install_fetch_gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn install_put_gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.put_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn put_requests(&self) -> Vec<Profile> {
        self.put_requests.lock().unwrap().clone()
    }

    pub(crate) fn unavailable() -> RemoteError {
        RemoteError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl ProfileRemoteOperations for FakeRemote {
    async fn fetch_profile(&self, id: &ProfileId) -> Result<Profile, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_requests.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let snapshot = self.server_profile(id);
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let mut profile = snapshot.ok_or_else(|| RemoteError::Status {
            status: 404,
            body: format!("no profile {id}"),
        })?;
        if let Some(other_id) = self.answer_with_id.lock().unwrap().clone() {
            profile.id = other_id;
        }
        Ok(profile)
    }

    async fn put_profile(&self, profile: &Profile) -> Result<Profile, RemoteError> {
        self.put_requests.lock().unwrap().push(profile.clone());
        if self.hang_requests.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let gate = self.put_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.set_server_profile(profile.clone());
        // Let other tasks interleave between the write and its response.
        tokio::task::yield_now().await;
        Ok(profile.clone())
    }
}
// --- End FakeRemote ---

// --- MockProfileStorage ---
pub(crate) struct MockProfileStorage {
    pub(crate) profiles: Mutex<HashMap<ProfileId, Profile>>,
    pub(crate) save_calls: AtomicUsize,
    pub(crate) fail_saves: AtomicBool,
}

impl MockProfileStorage {
    pub(crate) fn new() -> Self {
        MockProfileStorage {
            profiles: Mutex::new(HashMap::new()),
            save_calls: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub(crate) fn stored(&self, id: &ProfileId) -> Option<Profile> {
        self.profiles.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn save_count(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

impl ProfileStorageOperations for MockProfileStorage {
    fn save_profile(&self, profile: &Profile) -> Result<(), ProfileError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ProfileError::Io(io::Error::other("mocked disk full")));
        }
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    fn load_profile(&self, id: &ProfileId) -> Result<Option<Profile>, ProfileError> {
        Ok(self.stored(id))
    }
}
// --- End MockProfileStorage ---

pub(crate) fn pid(value: &str) -> ProfileId {
    ProfileId::new(value).unwrap()
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

// The fixture profile: id "1", Alice, owns n1 and n2, likes n1.
pub(crate) fn alice() -> Profile {
    let mut profile = Profile::new(pid("1"), "Alice".to_string());
    profile.nfts = strings(&["n1", "n2"]);
    profile.likes = strings(&["n1"]);
    profile
}
