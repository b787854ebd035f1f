use tokio::sync::watch;

/// Owner side of a cancellation generation counter.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<u64>,
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Token bound to the current generation.
    pub fn token(&self) -> CancelToken {
        let rx = self.tx.subscribe();
        let generation = *rx.borrow();
        CancelToken { rx, generation }
    }

    /// Invalidate every token issued so far.
    pub fn cancel(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }
}

/// Liveness check captured when a task starts.
///
/// The token is cancelled once its source moves to a new generation or is
/// dropped.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<u64>,
    generation: u64,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() != self.generation || self.rx.has_changed().is_err()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() != self.generation {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_invalidates_earlier_tokens_only() {
        let source = CancelSource::new();
        let old = source.token();
        source.cancel();
        let fresh = source.token();
        assert!(old.is_cancelled());
        assert!(!fresh.is_cancelled());
    }

    #[test]
    fn dropped_source_cancels() {
        let source = CancelSource::new();
        let token = source.token();
        drop(source);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let source = CancelSource::new();
        let token = source.token();
        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        source.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancel observed")
            .unwrap();
    }
}
