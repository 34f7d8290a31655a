//! Shared helpers for the integration suites

#![allow(dead_code)]

use lintbridge_core::initialization::{AsyncInitializer, AsyncInitializerFactory};
use lintbridge_core::test_utils::{Gate, InlineThreadHandling};
use lintbridge_core::threading::PrimaryThread;
use lintbridge_core::ThreadHandling;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Upper bound for anything that is expected to finish promptly
pub const PROMPTLY: Duration = Duration::from_secs(5);

/// Long enough for a misordered delegate to have run if it was going to
pub const SETTLE: Duration = Duration::from_millis(50);

pub fn inline_factory() -> AsyncInitializerFactory {
    AsyncInitializerFactory::new(Arc::new(InlineThreadHandling::background()), Handle::current())
}

pub fn primary_thread_factory(name: &str) -> (Arc<PrimaryThread>, AsyncInitializerFactory) {
    let primary = PrimaryThread::spawn(name).expect("primary thread should spawn");
    let thread_handling: Arc<dyn ThreadHandling> = Arc::clone(&primary) as Arc<dyn ThreadHandling>;
    (primary, AsyncInitializerFactory::new(thread_handling, Handle::current()))
}

/// Ordered record of which delegates ran
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl RunLog {
    pub fn record(&self, entry: &str) {
        self.entries.lock().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

/// Manual initializer whose delegate waits on `gate`, then records `owner`
pub fn gated_initializer(
    factory: &AsyncInitializerFactory,
    owner: &str,
    gate: &Gate,
    log: &RunLog,
    runs: &Arc<AtomicUsize>,
) -> AsyncInitializer {
    let gate = gate.clone();
    let log = log.clone();
    let runs = Arc::clone(runs);
    let entry = owner.to_string();
    factory.create_manual(owner, Vec::new(), move |_| async move {
        runs.fetch_add(1, Ordering::SeqCst);
        gate.wait().await;
        log.record(&entry);
        Ok(())
    })
}
