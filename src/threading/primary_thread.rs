//! Dedicated primary thread for hosts that do not provide their own.
//!
//! A single named OS thread drains a crossbeam channel of [`PrimaryWork`] in
//! FIFO order. The thread's identity is captured at spawn time, which is all
//! [`ThreadHandling::is_on_primary_thread`] needs.

use super::{PrimaryWork, ThreadAffinityError, ThreadHandling};
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, info, warn};

/// Event-loop thread standing in for the host UI thread
pub struct PrimaryThread {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<Sender<PrimaryWork>>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PrimaryThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryThread")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .field("accepting_work", &self.is_accepting_work())
            .finish()
    }
}

impl PrimaryThread {
    /// Spawn the primary thread and start draining its work queue
    pub fn spawn(name: impl Into<String>) -> Result<Arc<Self>, ThreadAffinityError> {
        let name = name.into();
        let (sender, receiver) = channel::unbounded::<PrimaryWork>();
        let loop_name = name.clone();

        let join_handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                debug!(thread = %loop_name, "Primary thread event loop started");
                for work in receiver.iter() {
                    // A panicking work item must not take the primary thread down with it
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
                        error!(
                            thread = %loop_name,
                            panic = %panic_message(payload.as_ref()),
                            "Work item panicked on primary thread"
                        );
                    }
                }
                debug!(thread = %loop_name, "Primary thread event loop drained");
            })
            .map_err(|e| ThreadAffinityError::SpawnFailed {
                name: name.clone(),
                message: e.to_string(),
            })?;

        let thread_id = join_handle.thread().id();
        info!(thread = %name, ?thread_id, "🧵 PRIMARY THREAD: Spawned");

        Ok(Arc::new(Self {
            name,
            thread_id,
            sender: Mutex::new(Some(sender)),
            join_handle: Mutex::new(Some(join_handle)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_accepting_work(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Stop accepting work, let queued work finish, and join the thread.
    ///
    /// Idempotent. When called from the primary thread itself the join is
    /// skipped; the loop still exits once the queue drains.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        if self.is_on_primary_thread() {
            warn!(thread = %self.name, "Primary thread shutdown requested from itself, not joining");
            return;
        }

        if let Some(handle) = self.join_handle.lock().take() {
            if handle.join().is_err() {
                error!(thread = %self.name, "Primary thread terminated abnormally");
            }
        }
        info!(thread = %self.name, "🛑 PRIMARY THREAD: Shut down");
    }
}

impl ThreadHandling for PrimaryThread {
    fn is_on_primary_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn dispatch_to_primary(&self, work: PrimaryWork) -> Result<(), ThreadAffinityError> {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender
                .send(work)
                .map_err(|_| ThreadAffinityError::PrimaryThreadUnavailable),
            None => Err(ThreadAffinityError::PrimaryThreadUnavailable),
        }
    }
}

impl Drop for PrimaryThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threading::ThreadHandlingExt;

    #[tokio::test]
    async fn test_work_runs_on_named_primary_thread() {
        let primary = PrimaryThread::spawn("test-primary").unwrap();
        assert!(!primary.is_on_primary_thread());

        let (name, on_primary) = primary
            .run_on_primary_thread({
                let primary = Arc::clone(&primary);
                move || {
                    (
                        thread::current().name().map(str::to_owned),
                        primary.is_on_primary_thread(),
                    )
                }
            })
            .await
            .unwrap();

        assert_eq!(name.as_deref(), Some("test-primary"));
        assert!(on_primary);
        primary.shutdown();
    }

    #[tokio::test]
    async fn test_reentrant_hop_runs_inline() {
        let primary = PrimaryThread::spawn("test-reentrant").unwrap();
        let inner = Arc::clone(&primary);

        let nested = primary
            .run_on_primary_thread(move || {
                // Already on the primary thread: the nested hop must not queue behind itself
                futures::executor::block_on(inner.run_on_primary_thread(|| 5))
            })
            .await
            .unwrap();

        assert_eq!(nested, Ok(5));
        primary.shutdown();
    }

    #[tokio::test]
    async fn test_work_is_processed_in_order() {
        let primary = PrimaryThread::spawn("test-ordering").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            primary
                .dispatch_to_primary(Box::new(move || seen.lock().push(i)))
                .unwrap();
        }
        primary.run_on_primary_thread(|| ()).await.unwrap();

        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
        primary.shutdown();
    }

    #[tokio::test]
    async fn test_panicking_work_does_not_kill_primary_thread() {
        let primary = PrimaryThread::spawn("test-panic").unwrap();

        let result = primary
            .run_on_primary_thread(|| -> u8 { panic!("host API exploded") })
            .await;
        assert_eq!(result, Err(ThreadAffinityError::PrimaryWorkAbandoned));

        assert_eq!(primary.run_on_primary_thread(|| 3).await, Ok(3));
        primary.shutdown();
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_is_rejected() {
        let primary = PrimaryThread::spawn("test-shutdown").unwrap();
        primary.shutdown();
        primary.shutdown();

        assert!(!primary.is_accepting_work());
        assert_eq!(
            primary.run_on_primary_thread(|| ()).await,
            Err(ThreadAffinityError::PrimaryThreadUnavailable)
        );
    }
}
