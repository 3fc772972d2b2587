use super::profile_screen_state::ProfileScreenState;
use super::ui_constants::{
    EDIT_FAILED_MESSAGE, LIKE_FAILED_MESSAGE, LOAD_FAILED_MESSAGE, PROFILE_NOT_LOADED_MESSAGE,
};
use super::view_types::{ViewCommand, ViewEvent, ViewEventHandler};
use crate::core::{Profile, ProfileClient, ProfileEdit, ProfileId, RequestHandle, ServiceResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

struct PresenterState {
    screen: ProfileScreenState,
    command_queue: VecDeque<ViewCommand>,
    pending_requests: Vec<RequestHandle>,
    closed: bool,
}

impl PresenterState {
    fn enqueue(&mut self, command: ViewCommand) {
        self.command_queue.push_back(command);
    }

    fn enqueue_profile_display(&mut self) {
        if let Some(header) = self.screen.header() {
            self.enqueue(ViewCommand::DisplayProfile { header });
        }
        self.enqueue_lists();
    }

    fn enqueue_lists(&mut self) {
        let rows = self.screen.title_rows.clone();
        self.enqueue(ViewCommand::ReloadTable { rows });
        let my_nfts = self.screen.my_nfts.clone();
        let favourite_nfts = self.screen.favourite_nfts.clone();
        self.enqueue(ViewCommand::UpdateNftLists {
            my_nfts,
            favourite_nfts,
        });
    }

    fn track(&mut self, handle: RequestHandle) {
        self.pending_requests.retain(|h| !h.is_finished());
        self.pending_requests.push(handle);
    }
}

/*
 * Everything a completion callback needs. Callbacks hold a `Weak` to this, so
 * once the presenter is gone they find nothing to update and return.
 */
struct PresenterShared {
    client: ProfileClient,
    profile_id: ProfileId,
    state: Mutex<PresenterState>,
}

impl PresenterShared {
    fn lock_state(&self) -> MutexGuard<'_, PresenterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /*
     * Wraps `on_result` so that it runs with the shared presenter, and only if
     * the presenter still exists and has not been closed.
     */
    fn callback<F>(
        weak: Weak<PresenterShared>,
        on_result: F,
    ) -> impl FnOnce(ServiceResult<Profile>) + Send + 'static
    where
        F: FnOnce(&Arc<PresenterShared>, ServiceResult<Profile>) + Send + 'static,
    {
        move |result| {
            let Some(shared) = weak.upgrade() else {
                log::debug!("ProfilePresenter: Presenter is gone, dropping result.");
                return;
            };
            if shared.lock_state().closed {
                log::debug!("ProfilePresenter: Screen closed, dropping result.");
                return;
            }
            on_result(&shared, result);
        }
    }

    fn start_load(self: &Arc<Self>) {
        log::debug!("ProfilePresenter: Loading profile '{}'.", self.profile_id);
        let writes_at_issue = {
            let mut state = self.lock_state();
            state.screen.is_loading = true;
            state.enqueue(ViewCommand::SetLoading { visible: true });
            state.screen.confirmed_writes
        };
        let handle = self.client.load_profile(
            self.profile_id.clone(),
            Self::callback(Arc::downgrade(self), move |shared, result| {
                shared.on_load_completed(result, writes_at_issue)
            }),
        );
        self.lock_state().track(handle);
    }

    fn on_load_completed(&self, result: ServiceResult<Profile>, writes_at_issue: u64) {
        let mut state = self.lock_state();
        state.screen.is_loading = false;
        state.enqueue(ViewCommand::SetLoading { visible: false });
        match result {
            Ok(profile) => {
                if !state.screen.apply_loaded_profile(profile, writes_at_issue) {
                    log::debug!(
                        "ProfilePresenter: Ignoring load of '{}' issued before a confirmed write.",
                        self.profile_id
                    );
                    return;
                }
                log::info!("ProfilePresenter: Profile '{}' loaded.", self.profile_id);
                state.enqueue_profile_display();
            }
            Err(e) => {
                log::error!("ProfilePresenter: Failed to load profile '{}': {e}", self.profile_id);
                state.enqueue(ViewCommand::ShowError {
                    message: format!("{LOAD_FAILED_MESSAGE}: {e}"),
                    retryable: true,
                });
            }
        }
    }

    /*
     * Shows the toggle immediately, then asks the service to persist it. On
     * failure the optimistic change is rolled back, the error is shown and a
     * reload brings the screen back in line with the server.
     */
    fn toggle_like(self: &Arc<Self>, nft_id: String) {
        {
            let mut state = self.lock_state();
            if !state.screen.begin_like_toggle(&nft_id) {
                log::warn!("ProfilePresenter: Like toggled for '{nft_id}' before the profile was loaded.");
                state.enqueue(ViewCommand::ShowError {
                    message: PROFILE_NOT_LOADED_MESSAGE.to_string(),
                    retryable: false,
                });
                return;
            }
            state.enqueue_lists();
        }

        let callback_nft_id = nft_id.clone();
        let handle = self.client.toggle_like(
            self.profile_id.clone(),
            nft_id,
            Self::callback(Arc::downgrade(self), move |shared, result| {
                shared.on_like_completed(&callback_nft_id, result)
            }),
        );
        self.lock_state().track(handle);
    }

    fn on_like_completed(self: &Arc<Self>, nft_id: &str, result: ServiceResult<Profile>) {
        let reconcile = {
            let mut state = self.lock_state();
            state.screen.finish_like_toggle(nft_id);
            match result {
                Ok(profile) => {
                    log::debug!("ProfilePresenter: Like toggle of '{nft_id}' confirmed.");
                    state.screen.apply_written_profile(profile);
                    state.enqueue_lists();
                    false
                }
                Err(e) => {
                    log::error!("ProfilePresenter: Like toggle of '{nft_id}' failed, rolling back: {e}");
                    state.enqueue_lists();
                    state.enqueue(ViewCommand::ShowError {
                        message: format!("{LIKE_FAILED_MESSAGE}: {e}"),
                        retryable: false,
                    });
                    true
                }
            }
        };
        if reconcile {
            self.start_load();
        }
    }

    /*
     * Applies the edited fields to the current copy and sends the full profile,
     * likes and NFTs included. Nothing changes on screen until the service
     * confirms.
     */
    fn save_edit(self: &Arc<Self>, edit: ProfileEdit) {
        let updated = {
            let mut state = self.lock_state();
            let Some(current) = state.screen.profile.clone() else {
                log::warn!("ProfilePresenter: Profile edited before it was loaded.");
                state.enqueue(ViewCommand::ShowError {
                    message: PROFILE_NOT_LOADED_MESSAGE.to_string(),
                    retryable: false,
                });
                return;
            };
            let mut updated = current;
            updated.apply_edit(edit);
            updated
        };

        let handle = self.client.update_profile(
            updated,
            Self::callback(Arc::downgrade(self), |shared, result| shared.on_edit_completed(result)),
        );
        self.lock_state().track(handle);
    }

    fn on_edit_completed(&self, result: ServiceResult<Profile>) {
        let mut state = self.lock_state();
        match result {
            Ok(profile) => {
                log::info!("ProfilePresenter: Profile '{}' saved.", profile.id);
                state.screen.apply_written_profile(profile);
                state.enqueue_profile_display();
            }
            Err(e) => {
                log::error!("ProfilePresenter: Failed to save profile '{}': {e}", self.profile_id);
                state.enqueue(ViewCommand::ShowError {
                    message: format!("{EDIT_FAILED_MESSAGE}: {e}"),
                    retryable: false,
                });
            }
        }
    }

    fn close(&self) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        let outstanding = state.pending_requests.len();
        for handle in state.pending_requests.drain(..) {
            handle.cancel();
        }
        log::debug!("ProfilePresenter: Closed, cancelled {outstanding} request(s).");
    }
}

/*
 * Manages the state and logic of one profile screen in a platform-agnostic
 * manner. It processes `ViewEvent`s from the view, talks to the profile
 * service through a `ProfileClient`, and queues `ViewCommand`s for the view to
 * drain. All completion callbacks run on the main queue, the same context the
 * view calls in from.
 */
pub struct ProfilePresenter {
    shared: Arc<PresenterShared>,
}

impl ProfilePresenter {
    pub fn new(client: ProfileClient, profile_id: ProfileId) -> Self {
        log::debug!("ProfilePresenter::new called for profile '{profile_id}'.");
        ProfilePresenter {
            shared: Arc::new(PresenterShared {
                client,
                profile_id,
                state: Mutex::new(PresenterState {
                    screen: ProfileScreenState::new(),
                    command_queue: VecDeque::new(),
                    pending_requests: Vec::new(),
                    closed: false,
                }),
            }),
        }
    }

    pub fn screen_state(&self) -> ProfileScreenState {
        self.shared.lock_state().screen.clone()
    }

    // True while any request started by this presenter may still call back.
    pub fn is_busy(&self) -> bool {
        self.shared
            .lock_state()
            .pending_requests
            .iter()
            .any(|h| !h.is_finished())
    }
}

impl ViewEventHandler for ProfilePresenter {
    fn handle_event(&mut self, event: ViewEvent) {
        if self.shared.lock_state().closed {
            log::debug!("ProfilePresenter: Ignoring {event:?} after close.");
            return;
        }
        log::trace!("ProfilePresenter: Handling {event:?}.");
        match event {
            ViewEvent::ViewDidLoad | ViewEvent::RetryRequested => self.shared.start_load(),
            ViewEvent::LikeToggled { nft_id } => self.shared.toggle_like(nft_id),
            ViewEvent::ProfileEdited(edit) => self.shared.save_edit(edit),
            ViewEvent::ViewClosed => self.shared.close(),
        }
    }

    fn try_dequeue_command(&mut self) -> Option<ViewCommand> {
        self.shared.lock_state().command_queue.pop_front()
    }
}

impl Drop for ProfilePresenter {
    fn drop(&mut self) {
        self.shared.close();
    }
}
