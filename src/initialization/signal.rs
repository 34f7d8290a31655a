//! Memoized completion signal shared by every caller of `start()`.

use super::errors::InitializationError;
use futures::future::BoxFuture;
use std::future::IntoFuture;
use tokio::sync::watch;

pub type InitializationOutcome = Result<(), InitializationError>;

/// Write side of a completion signal; resolves at most once
#[derive(Debug)]
pub(crate) struct CompletionSource {
    owner: String,
    sender: watch::Sender<Option<InitializationOutcome>>,
}

impl CompletionSource {
    pub(crate) fn new(owner: impl Into<String>) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            owner: owner.into(),
            sender,
        }
    }

    /// Resolve the signal. Returns `false` if it was already resolved, in
    /// which case the first outcome is kept.
    pub(crate) fn complete(&self, outcome: InitializationOutcome) -> bool {
        let mut outcome = Some(outcome);
        self.sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = outcome.take();
            true
        })
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.sender.borrow().is_some()
    }

    pub(crate) fn signal(&self) -> CompletionSignal {
        CompletionSignal {
            owner: self.owner.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// Awaitable, clonable view of "this component's setup, eventually".
///
/// Every clone observes the same single outcome, whether it subscribes before
/// or after resolution.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    owner: String,
    receiver: watch::Receiver<Option<InitializationOutcome>>,
}

impl CompletionSignal {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Wait for the outcome
    pub async fn wait(&self) -> InitializationOutcome {
        let mut receiver = self.receiver.clone();
        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().unwrap_or(Ok(())),
            Err(_) => Err(InitializationError::SequenceDropped {
                owner: self.owner.clone(),
            }),
        };
        outcome
    }

    pub fn is_completed(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    /// Non-blocking peek at the outcome
    pub fn outcome(&self) -> Option<InitializationOutcome> {
        self.receiver.borrow().clone()
    }
}

impl IntoFuture for CompletionSignal {
    type Output = InitializationOutcome;
    type IntoFuture = BoxFuture<'static, InitializationOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}
