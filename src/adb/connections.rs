// Per-serial connection cache
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Lazily opened connections keyed by device serial.
///
/// Connecting holds only that serial's cell, so a device that hangs while
/// opening does not block calls to any other device.
pub struct ConnectionCache<T> {
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<T>>>>>,
}

impl<T> Default for ConnectionCache<T> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> ConnectionCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached connection for `serial`, opening it with `connect` on first use.
    /// A failed open leaves nothing cached.
    pub async fn get_or_connect<E, F, Fut>(&self, serial: &str, connect: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, E>>,
    {
        let cell = Arc::clone(self.cells.lock().await.entry(serial.to_string()).or_default());
        cell.get_or_try_init(connect).await.map(Arc::clone)
    }

    /// Drop the cached connection. Returns whether one was cached.
    pub async fn forget(&self, serial: &str) -> bool {
        self.cells
            .lock()
            .await
            .remove(serial)
            .is_some_and(|cell| cell.initialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_connects_once_per_serial() {
        let cache = ConnectionCache::<u32>::new();
        let opened = AtomicUsize::new(0);
        for _ in 0..3 {
            let conn = cache
                .get_or_connect("emulator-5554", || async {
                    opened.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(Arc::new(7))
                })
                .await
                .unwrap();
            assert_eq!(*conn, 7);
        }
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_open_is_retried() {
        let cache = ConnectionCache::<u32>::new();
        let first = cache
            .get_or_connect("emulator-5554", || async { Err::<Arc<u32>, _>("offline") })
            .await;
        assert_eq!(first, Err("offline"));
        let second = cache
            .get_or_connect("emulator-5554", || async { Ok::<_, &str>(Arc::new(1)) })
            .await;
        assert_eq!(second.map(|c| *c), Ok(1));
    }

    #[tokio::test]
    async fn test_forget_forces_reconnect() {
        let cache = ConnectionCache::<u32>::new();
        cache
            .get_or_connect("emulator-5554", || async { Ok::<_, ()>(Arc::new(1)) })
            .await
            .unwrap();
        assert!(cache.forget("emulator-5554").await);
        assert!(!cache.forget("emulator-5554").await);
        let conn = cache
            .get_or_connect("emulator-5554", || async { Ok::<_, ()>(Arc::new(2)) })
            .await
            .unwrap();
        assert_eq!(*conn, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_open_does_not_block_other_serials() {
        let cache = Arc::new(ConnectionCache::<u32>::new());
        let release = Arc::new(Notify::new());

        let hung = {
            let cache = Arc::clone(&cache);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                cache
                    .get_or_connect("emulator-5554", || async move {
                        release.notified().await;
                        Ok::<_, ()>(Arc::new(1))
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let other = tokio::time::timeout(
            Duration::from_millis(100),
            cache.get_or_connect("emulator-5556", || async { Ok::<_, ()>(Arc::new(2)) }),
        )
        .await
        .expect("other serial must not wait on the hung open")
        .unwrap();
        assert_eq!(*other, 2);
        assert!(!hung.is_finished());

        release.notify_one();
        assert_eq!(*hung.await.unwrap().unwrap(), 1);
    }
}
