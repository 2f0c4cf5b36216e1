// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::{broadcast, Mutex};

/// Coalescing scheduler: the first caller in an idle window arms a timer;
/// everyone who calls before it fires joins the window and receives the
/// result of the single underlying operation, which runs once when the
/// window elapses. Windows are independent; nothing orders results across
/// windows.
pub(crate) struct Coalescer<T> {
    window: Duration,
    pending: Mutex<Option<broadcast::Sender<T>>>,
}

impl<T> Coalescer<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(window: Duration) -> Self {
        Coalescer {
            window,
            pending: Mutex::new(None),
        }
    }

    /// Joins the current window, or opens a new one that will run `op` when
    /// the window elapses. `op` from joining callers is dropped unused; only
    /// the window opener's operation runs. Returns `None` if the executing
    /// task was torn down before broadcasting, which only happens at runtime
    /// shutdown.
    pub(crate) async fn call<F, Fut>(self: &Arc<Self>, op: F) -> Option<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send,
    {
        let mut rx = {
            let mut pending = self.pending.lock().await;
            match pending.as_ref() {
                Some(tx) => tx.subscribe(),
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    *pending = Some(tx.clone());
                    let this = Arc::clone(self);
                    tokio::spawn(async move {
                        tokio::time::sleep(this.window).await;
                        let result = op().await;
                        // Clear the slot before broadcasting so a caller
                        // arriving now opens a fresh window instead of
                        // joining a finished one.
                        this.pending.lock().await.take();
                        let _ = tx.send(result);
                    });
                    rx
                }
            }
        };
        rx.recv().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn calls_within_one_window_coalesce() {
        let coalescer = Arc::new(Coalescer::new(Duration::from_millis(20)));
        let counter = Arc::new(AtomicUsize::new(0));

        let op = |counter: Arc<AtomicUsize>| {
            move || async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
        };

        let (a, b, c) = tokio::join!(
            coalescer.call(op(Arc::clone(&counter))),
            coalescer.call(op(Arc::clone(&counter))),
            coalescer.call(op(Arc::clone(&counter))),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(a, Some(1));
        assert_eq!(b, Some(1));
        assert_eq!(c, Some(1));
    }

    #[tokio::test]
    async fn calls_in_separate_windows_run_separately() {
        let coalescer = Arc::new(Coalescer::new(Duration::from_millis(10)));
        let counter = Arc::new(AtomicUsize::new(0));

        let op = |counter: Arc<AtomicUsize>| {
            move || async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
        };

        let first = coalescer.call(op(Arc::clone(&counter))).await;
        let second = coalescer.call(op(Arc::clone(&counter))).await;

        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
