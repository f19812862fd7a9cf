use tokio::sync::watch;

/// Owned by a page or form. Dropping it cancels every token handed out.
#[derive(Debug)]
pub struct Lifetime {
    tx: watch::Sender<bool>,
}

/// Cheap handle carried by each in-flight request.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl Lifetime {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Lifetime { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::new()
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the owning lifetime is cancelled or dropped.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
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
    fn test_fresh_token_is_live() {
        let lifetime = Lifetime::new();
        assert!(!lifetime.token().is_cancelled());
    }

    #[test]
    fn test_drop_cancels_outstanding_tokens() {
        let lifetime = Lifetime::new();
        let token = lifetime.token();
        drop(lifetime);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let lifetime = Lifetime::new();
        let mut token = lifetime.token();
        let waiter = tokio::spawn(async move { token.cancelled().await });
        lifetime.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("token should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_work_is_abandoned_on_cancel() {
        let lifetime = Lifetime::new();
        let mut token = lifetime.token();
        drop(lifetime);
        let outcome = tokio::select! {
            _ = token.cancelled() => None,
            _ = tokio::time::sleep(Duration::from_secs(5)) => Some(()),
        };
        assert_eq!(outcome, None);
    }
}
