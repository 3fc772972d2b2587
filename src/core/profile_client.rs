/*
 * Callback-style front end of `ProfileService` for the presenter. Each call
 * starts the operation on the runtime's worker threads and returns a
 * `RequestHandle` immediately. When the operation finishes, its result is
 * posted to the main queue and the completion callback runs there, exactly
 * once, unless the handle was cancelled first.
 */
use super::main_queue::MainQueueSender;
use super::models::{Profile, ProfileId};
use super::profile_service::{ProfileService, ServiceResult};
use super::request_handle::RequestHandle;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

#[derive(Clone)]
pub struct ProfileClient {
    service: Arc<ProfileService>,
    main_queue: MainQueueSender,
    runtime: Handle,
}

impl ProfileClient {
    pub fn new(service: Arc<ProfileService>, main_queue: MainQueueSender, runtime: Handle) -> Self {
        log::debug!("ProfileClient::new called.");
        ProfileClient {
            service,
            main_queue,
            runtime,
        }
    }

    pub fn load_profile<F>(&self, id: ProfileId, on_complete: F) -> RequestHandle
    where
        F: FnOnce(ServiceResult<Profile>) + Send + 'static,
    {
        self.dispatch("load", on_complete, move |service| async move {
            service.load_profile(&id).await
        })
    }

    pub fn update_profile<F>(&self, profile: Profile, on_complete: F) -> RequestHandle
    where
        F: FnOnce(ServiceResult<Profile>) + Send + 'static,
    {
        self.dispatch("update", on_complete, move |service| async move {
            service.update_profile(profile).await
        })
    }

    pub fn toggle_like<F>(&self, id: ProfileId, nft_id: String, on_complete: F) -> RequestHandle
    where
        F: FnOnce(ServiceResult<Profile>) + Send + 'static,
    {
        self.dispatch("toggle_like", on_complete, move |service| async move {
            service.toggle_like(&id, &nft_id).await
        })
    }

    fn dispatch<F, Op, Fut>(&self, operation: &'static str, on_complete: F, op: Op) -> RequestHandle
    where
        F: FnOnce(ServiceResult<Profile>) + Send + 'static,
        Op: FnOnce(Arc<ProfileService>) -> Fut + Send + 'static,
        Fut: Future<Output = ServiceResult<Profile>> + Send + 'static,
    {
        let handle = RequestHandle::new();
        let finish = handle.finish_on_drop();
        let service = self.service.clone();
        let main_queue = self.main_queue.clone();

        self.runtime.spawn(async move {
            let token = finish.handle().token();
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::debug!("ProfileClient: {operation} cancelled before completion.");
                    return;
                }
                result = op(service) => result,
            };

            // `finish` moves into the job and is dropped with it, run or not.
            let posted = main_queue.post(move || {
                // Cancellation may have happened while the job sat in the queue.
                if finish.handle().is_cancelled() {
                    log::debug!("ProfileClient: {operation} cancelled, dropping queued result.");
                    return;
                }
                on_complete(result);
            });
            if !posted {
                log::warn!("ProfileClient: Main queue is gone, {operation} result dropped.");
            }
        });

        handle
    }
}
