//! Completion-callback calling convention
//!
//! Facade operations are plain futures. `on_complete` runs one on the tokio
//! runtime and hands its result to a callback, so callers that prefer the
//! `(error, result)` style share the exact same code path.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::FsResult;

pub trait Completion<T>: Future<Output = FsResult<T>> + Send + Sized + 'static
where
    T: Send + 'static,
{
    /// Spawn the operation and call `callback` with its outcome
    ///
    /// Must be called from within a tokio runtime.
    fn on_complete<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(FsResult<T>) + Send + 'static,
    {
        tokio::spawn(async move {
            callback(self.await);
        })
    }
}

impl<T, Fut> Completion<T> for Fut
where
    T: Send + 'static,
    Fut: Future<Output = FsResult<T>> + Send + 'static,
{
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::oneshot;

    use super::*;
    use crate::facade::AnyFs;
    use crate::memory::MemoryAdapter;

    #[tokio::test]
    async fn test_callback_receives_same_result() {
        let fs = AnyFs::new(Arc::new(MemoryAdapter::new())).unwrap();
        fs.write_file("/a.txt", "abc").await.unwrap();

        let (tx, rx) = oneshot::channel();
        let handle = fs.clone();
        async move { handle.read_file("/a.txt").await }.on_complete(move |result| {
            let _ = tx.send(result);
        });
        assert_eq!(rx.await.unwrap().unwrap(), b"abc");

        let (tx, rx) = oneshot::channel();
        let handle = fs.clone();
        async move { handle.metadata("/missing").await }.on_complete(move |result| {
            let _ = tx.send(result.map_err(|e| e.code()));
        });
        assert_eq!(rx.await.unwrap().unwrap_err(), "ENOENT");
    }
}
