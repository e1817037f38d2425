//! Priority-ordered event fan-out
//!
//! The dispatcher keeps a weak reference to each module's event handler.
//! A dispatch takes a snapshot of the running handlers under the table lock,
//! releases the lock, and only then calls into module code. Each snapshot
//! entry pins its module's code unit, so a module unloaded concurrently can
//! still receive the in-flight event but never runs after its library closed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use realm_module_api::{EventHandler, ModulePriority};

use super::loader::LoadedUnit;

struct HandlerEntry {
    priority: ModulePriority,
    seq: u64,
    running: bool,
    handler: Weak<dyn EventHandler>,
    unit: Weak<LoadedUnit>,
}

#[derive(Default)]
struct HandlerTable {
    entries: HashMap<String, HandlerEntry>,
    next_seq: u64,
}

/// A handler pinned for the duration of one dispatch
pub struct HandlerRef {
    module: String,
    priority: ModulePriority,
    handler: Arc<dyn EventHandler>,
    _unit: Arc<LoadedUnit>,
}

impl HandlerRef {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn priority(&self) -> ModulePriority {
        self.priority
    }
}

/// Table of registered handlers plus the dispatch loops
#[derive(Default)]
pub struct EventDispatcher {
    table: Mutex<HandlerTable>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler of `module`. New registrations are
    /// not dispatched to until [`EventDispatcher::set_running`] is called.
    pub fn register(
        &self,
        module: &str,
        priority: ModulePriority,
        handler: &Arc<dyn EventHandler>,
        unit: &Arc<LoadedUnit>,
    ) {
        let mut table = self.table.lock();
        let seq = table.next_seq;
        table.next_seq += 1;
        table.entries.insert(
            module.to_string(),
            HandlerEntry {
                priority,
                seq,
                running: false,
                handler: Arc::downgrade(handler),
                unit: Arc::downgrade(unit),
            },
        );
        tracing::debug!(module = %module, priority = %priority, "Event handler registered");
    }

    /// Mark a registered handler as eligible (or not) for dispatch
    pub fn set_running(&self, module: &str, running: bool) {
        if let Some(entry) = self.table.lock().entries.get_mut(module) {
            entry.running = running;
        }
    }

    /// Remove the handler of `module`, returning whether one was registered
    pub fn unregister(&self, module: &str) -> bool {
        let removed = self.table.lock().entries.remove(module).is_some();
        if removed {
            tracing::debug!(module = %module, "Event handler unregistered");
        }
        removed
    }

    pub fn is_registered(&self, module: &str) -> bool {
        self.table.lock().entries.contains_key(module)
    }

    pub fn handler_count(&self) -> usize {
        self.table.lock().entries.len()
    }

    /// Running handlers in dispatch order: priority descending, then
    /// registration order.
    pub fn snapshot(&self) -> Vec<HandlerRef> {
        let table = self.table.lock();
        let mut live: Vec<(u64, HandlerRef)> = table
            .entries
            .iter()
            .filter(|(_, entry)| entry.running)
            .filter_map(|(name, entry)| {
                let handler = entry.handler.upgrade()?;
                let unit = entry.unit.upgrade()?;
                Some((
                    entry.seq,
                    HandlerRef {
                        module: name.clone(),
                        priority: entry.priority,
                        handler,
                        _unit: unit,
                    },
                ))
            })
            .collect();
        drop(table);

        live.sort_by(|(seq_a, a), (seq_b, b)| {
            b.priority.cmp(&a.priority).then(seq_a.cmp(seq_b))
        });
        live.into_iter().map(|(_, handler)| handler).collect()
    }

    /// Deliver a notification to every running handler.
    ///
    /// A handler that panics is logged and skipped.
    pub fn notify<F>(&self, event: &'static str, mut deliver: F)
    where
        F: FnMut(&dyn EventHandler),
    {
        for entry in self.snapshot() {
            let outcome =
                std::panic::catch_unwind(AssertUnwindSafe(|| deliver(entry.handler.as_ref())));
            if outcome.is_err() {
                tracing::debug!(module = %entry.module, event, "Event handler panicked, skipping");
            }
        }
    }

    /// Deliver a request to running handlers until one rejects it.
    ///
    /// Returns `false` as soon as a handler answers `false`. A panicking
    /// handler is logged and treated as having accepted.
    pub fn request<F>(&self, event: &'static str, mut ask: F) -> bool
    where
        F: FnMut(&dyn EventHandler) -> bool,
    {
        for entry in self.snapshot() {
            match std::panic::catch_unwind(AssertUnwindSafe(|| ask(entry.handler.as_ref()))) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(module = %entry.module, event, "Event rejected by handler");
                    return false;
                }
                Err(_) => {
                    tracing::debug!(module = %entry.module, event, "Event handler panicked, skipping");
                }
            }
        }
        true
    }
}
