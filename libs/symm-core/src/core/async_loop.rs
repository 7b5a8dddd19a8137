use std::future::Future;

use eyre::{eyre, Result};
use tokio::{
    spawn,
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;

pub struct AsyncTask<T> {
    join_handle: JoinHandle<T>,
    cancel_token: CancellationToken,
}

impl<T> AsyncTask<T> {
    pub fn new(join_handle: JoinHandle<T>, cancel_token: CancellationToken) -> Self {
        Self {
            join_handle,
            cancel_token,
        }
    }

    pub async fn stop(self) -> Result<T, JoinError> {
        self.cancel_token.cancel();
        self.join_handle.await
    }
}

/// Background task that is stopped by cancelling its token and awaiting it.
pub struct AsyncLoop<T> {
    async_task: Option<AsyncTask<T>>,
}

impl<T> Default for AsyncLoop<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsyncLoop<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self { async_task: None }
    }

    pub fn is_running(&self) -> bool {
        self.async_task.is_some()
    }

    pub fn start<Fut>(&mut self, f: impl FnOnce(CancellationToken) -> Fut)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let cancel_token_cloned = cancel_token.clone();

        self.async_task
            .replace(AsyncTask::new(spawn(f(cancel_token_cloned)), cancel_token));
    }

    pub async fn stop(&mut self) -> Result<T> {
        let task = self
            .async_task
            .take()
            .ok_or_else(|| eyre!("AsyncLoop is not running"))?;

        task.stop()
            .await
            .map_err(|err| eyre!("AsyncLoop failed to join: {:?}", err))
    }
}
