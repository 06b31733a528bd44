// State management module
//
// This module provides the StateManager which wraps the ProcessingContext with
// thread-safe access using Arc<RwLock<T>> and emits change events for the host.

use crate::models::{ProcessingContext, RuleSet};
use camino::Utf8PathBuf;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when the context is modified
///
/// These events let the host follow the document without polling it.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A new document replaced the previous context
    DocumentLoaded {
        path: Option<Utf8PathBuf>,
        len: usize,
    },

    /// The document text was modified
    TextChanged { before_len: usize, after_len: usize },

    /// A processing log entry was appended
    StepLogged { step: String, description: String },

    /// Rule sets changed (for example a caps decision added to a set)
    RulesChanged,

    /// Progress report from the orchestrator
    ProgressUpdated {
        current: usize,
        total: usize,
        description: String,
    },

    /// The context was cleared
    StateReset,
}

/// Cheap summary of a context used to detect what an update changed.
struct Fingerprint {
    text_len: usize,
    text_hash: u64,
    log_len: usize,
    rules: RuleSet,
}

impl Fingerprint {
    fn of(ctx: &ProcessingContext) -> Self {
        let mut hasher = DefaultHasher::new();
        ctx.text.hash(&mut hasher);
        Self {
            text_len: ctx.text.len(),
            text_hash: hasher.finish(),
            log_len: ctx.processing_log.len(),
            rules: ctx.rules.clone(),
        }
    }
}

/// Thread-safe owner of the [`ProcessingContext`] with event emission
///
/// This is the single mutator gate for a document run:
/// - Provides thread-safe access via `Arc<RwLock<T>>`
/// - Holds the write lock for exactly one discrete operation (one pipeline step,
///   one interactive decision), never across a wait for user input
/// - Detects changes and emits [`StateChange`] events on a broadcast channel
///
/// # Usage
///
/// - [`read()`](Self::read) for reading without cloning
/// - [`update()`](Self::update) / [`update_with()`](Self::update_with) for mutations
/// - [`subscribe()`](Self::subscribe) for listening to changes
pub struct StateManager {
    /// The processing context protected by RwLock for thread-safe access
    state: Arc<RwLock<ProcessingContext>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with an empty context
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        Self::with_context(ProcessingContext::default())
    }

    pub fn with_context(ctx: ProcessingContext) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ctx)),
            state_tx,
        }
    }

    /// Get a clone of the current context
    pub fn snapshot(&self) -> ProcessingContext {
        self.read(|ctx| ctx.clone())
    }

    /// Current document text
    pub fn text(&self) -> String {
        self.read(|ctx| ctx.text.clone())
    }

    /// Execute a function with read access to the context
    ///
    /// # Example
    /// ```ignore
    /// let len = state_manager.read(|ctx| ctx.text.len());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ProcessingContext) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the context and emit change events
    ///
    /// # Arguments
    /// * `update_fn` - A function that mutates the context
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut ProcessingContext),
    {
        self.update_with(update_fn).1
    }

    /// Update the context, returning the closure's result along with the events
    ///
    /// The write lock is held only while `update_fn` runs.
    ///
    /// # Example
    /// ```ignore
    /// let (step, _changes) = state_manager.update_with(|ctx| engine.choose(ctx, "blue"));
    /// ```
    pub fn update_with<F, R>(&self, update_fn: F) -> (R, Vec<StateChange>)
    where
        F: FnOnce(&mut ProcessingContext) -> R,
    {
        let (result, changes) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let before = Fingerprint::of(&state);
            let result = update_fn(&mut state);
            (result, self.detect_changes(&before, &state))
        };

        self.emit(&changes);
        (result, changes)
    }

    /// Replace the context with a freshly loaded document
    pub fn load_document(&self, ctx: ProcessingContext) -> Vec<StateChange> {
        let change = StateChange::DocumentLoaded {
            path: ctx.filepath.clone(),
            len: ctx.text.len(),
        };
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = ctx;
        }

        let changes = vec![change];
        self.emit(&changes);
        changes
    }

    /// Clear the context
    pub fn reset(&self) -> Vec<StateChange> {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = ProcessingContext::default();
        }

        let changes = vec![StateChange::StateReset];
        self.emit(&changes);
        changes
    }

    /// Broadcast a progress report; the context itself is untouched
    pub fn report_progress(&self, current: usize, total: usize, description: &str) -> StateChange {
        let change = StateChange::ProgressUpdated {
            current,
            total,
            description: description.to_string(),
        };
        self.emit(std::slice::from_ref(&change));
        change
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn emit(&self, changes: &[StateChange]) {
        for change in changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }
    }

    /// Detect what changed between the fingerprint and the updated context
    fn detect_changes(&self, before: &Fingerprint, after: &ProcessingContext) -> Vec<StateChange> {
        let mut changes = Vec::new();
        let after_print = Fingerprint::of(after);

        if before.text_len != after_print.text_len || before.text_hash != after_print.text_hash {
            changes.push(StateChange::TextChanged {
                before_len: before.text_len,
                after_len: after_print.text_len,
            });
        }

        for entry in after.processing_log.iter().skip(before.log_len) {
            changes.push(StateChange::StepLogged {
                step: entry.step.clone(),
                description: entry.description.clone(),
            });
        }

        if before.rules != after_print.rules {
            changes.push(StateChange::RulesChanged);
        }

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Cloning shares the same context and channel
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let ctx = manager.snapshot();

        assert!(ctx.text.is_empty());
        assert!(ctx.processing_log.is_empty());
    }

    #[test]
    fn test_update_with_change_detection() {
        let manager = StateManager::new();

        let changes = manager.update(|ctx| {
            ctx.text = "new text".to_string();
            ctx.log_change("test_step", "did something", 0, 8);
        });

        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0],
            StateChange::TextChanged {
                before_len: 0,
                after_len: 8
            }
        );
        assert!(matches!(changes[1], StateChange::StepLogged { ref step, .. } if step == "test_step"));
    }

    #[test]
    fn test_same_length_edit_detected() {
        let manager = StateManager::with_context(ProcessingContext::new("ABC", None, RuleSet::default()));
        let changes = manager.update(|ctx| ctx.text = ctx.text.to_lowercase());
        assert_eq!(
            changes,
            vec![StateChange::TextChanged {
                before_len: 3,
                after_len: 3
            }]
        );
    }

    #[test]
    fn test_no_change_no_events() {
        let manager = StateManager::new();
        let (len, changes) = manager.update_with(|ctx| ctx.text.len());
        assert_eq!(len, 0);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_rules_change_detected() {
        let manager = StateManager::new();
        let changes = manager.update(|ctx| {
            ctx.rules.ignore_set.insert("NASA".to_string());
        });
        assert_eq!(changes, vec![StateChange::RulesChanged]);
    }

    #[test]
    fn test_load_and_reset() {
        let manager = StateManager::new();
        let changes = manager.load_document(ProcessingContext::new(
            "hello",
            Some(Utf8PathBuf::from("book.txt")),
            RuleSet::default(),
        ));
        assert_eq!(
            changes,
            vec![StateChange::DocumentLoaded {
                path: Some(Utf8PathBuf::from("book.txt")),
                len: 5
            }]
        );
        assert_eq!(manager.text(), "hello");

        let changes = manager.reset();
        assert_eq!(changes, vec![StateChange::StateReset]);
        assert!(manager.read(|ctx| ctx.filepath.is_none()));
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.update(|ctx| ctx.text.push('x'));

        let event = rx.try_recv();
        assert!(matches!(event, Ok(StateChange::TextChanged { .. })));
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.report_progress(1, 6, "Remove pagination");

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.update(|ctx| ctx.text = "shared".to_string());

        assert_eq!(manager2.text(), "shared");
    }
}
