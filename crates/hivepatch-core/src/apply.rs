//! # Apply Engine
//!
//! Executes a `Config` against a live store: for every key in order, open it
//! read+write, then for every property in order read the live value into
//! `prev_value` and write the new value.
//!
//! ## Failure semantics
//!
//! - The first error stops everything. No later property of the same key and
//!   no later key is touched.
//! - Nothing is undone. Keys and properties already written stay written.
//! - A `prev_value` captured before a failing write is kept, so the partially
//!   populated `Config` still describes what was there before the attempt.
//! - Every opened key is released exactly once on every exit path; keys are
//!   held through `OpenKey`, whose drop closes them.
//!
//! ## Concurrency
//!
//! Synchronous and single threaded. Two engines applying overlapping configs
//! to the same store at the same time would interleave their reads and
//! writes; that usage is not supported.

use crate::dispatch::dispatch;
use crate::scope::{Scope, ScopeHandle};
use crate::storage::{Access, OpenKey, RegistryStore, StoreError};
use crate::{Config, HivepatchError, ValType, Value};

// =============================================================================
// JOURNAL
// =============================================================================

/// One successful write: where, what was there, what replaced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Position of the key in the config.
    pub key_index: usize,
    pub scope: Scope,
    pub path: String,
    pub name: String,
    pub kind: ValType,
    pub prior: Value,
    pub new: Value,
}

/// Counts from a successful apply or validate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Keys fully processed.
    pub keys: usize,
    /// Properties read (validate) or read and written (apply).
    pub properties: usize,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Runs apply and validate passes against one store.
pub struct ApplyEngine<'s> {
    store: &'s mut dyn RegistryStore,
    journal: Vec<JournalEntry>,
}

impl std::fmt::Debug for ApplyEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyEngine")
            .field("journal_len", &self.journal.len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Validate,
    Apply,
}

impl<'s> ApplyEngine<'s> {
    /// Create an engine over a store.
    pub fn new(store: &'s mut dyn RegistryStore) -> Self {
        Self {
            store,
            journal: Vec::new(),
        }
    }

    /// Writes performed so far, in order. Survives a failed apply.
    #[must_use]
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Consume the engine and keep its journal.
    #[must_use]
    pub fn into_journal(self) -> Vec<JournalEntry> {
        self.journal
    }

    /// Read every live value into `prev_value` and write every new value.
    ///
    /// On error `config` is left as far as the engine got: properties already
    /// reached carry their captured `prev_value`.
    pub fn apply(&mut self, config: &mut Config) -> Result<ApplyReport, HivepatchError> {
        self.run(config, Pass::Apply)
    }

    /// Dry run: open, dispatch and read into `prev_value`, never write.
    ///
    /// Keys are opened read+write so missing permissions show up here. The
    /// store can still change before a later apply.
    pub fn validate(&mut self, config: &mut Config) -> Result<ApplyReport, HivepatchError> {
        self.run(config, Pass::Validate)
    }

    fn run(&mut self, config: &mut Config, pass: Pass) -> Result<ApplyReport, HivepatchError> {
        let mut report = ApplyReport::default();

        for (key_index, key) in config.keys.iter_mut().enumerate() {
            let scope: ScopeHandle = key.scope.handle();
            let mut open = OpenKey::open(&mut *self.store, scope, &key.path, Access::ReadWrite)
                .map_err(|source| HivepatchError::Open {
                    scope,
                    path: key.path.clone(),
                    source,
                })?;
            let token = open.token();

            for property in &mut key.properties {
                let accessors = dispatch(property.kind);

                let prior = (accessors.read)(open.store(), token, &property.name)
                    .map_err(|source| HivepatchError::Read {
                        path: key.path.clone(),
                        name: property.name.clone(),
                        kind: property.kind,
                        source,
                    })?;
                property.prev_value = Some(prior.clone());
                report.properties += 1;

                if pass == Pass::Validate {
                    continue;
                }

                let write_error = |source: StoreError| HivepatchError::Write {
                    path: key.path.clone(),
                    name: property.name.clone(),
                    kind: property.kind,
                    attempted: property.value.clone(),
                    source,
                };

                if !property.is_well_formed() {
                    return Err(write_error(StoreError::ShapeMismatch {
                        expected: property.kind,
                        found: property.value.kind(),
                    }));
                }

                (accessors.write)(open.store_mut(), token, &property.name, &property.value)
                    .map_err(write_error)?;

                self.journal.push(JournalEntry {
                    key_index,
                    scope: key.scope.clone(),
                    path: key.path.clone(),
                    name: property.name.clone(),
                    kind: property.kind,
                    prior,
                    new: property.value.clone(),
                });
            }

            report.keys += 1;
        }

        Ok(report)
    }
}

/// Apply a config with a fresh engine.
pub fn apply(
    store: &mut dyn RegistryStore,
    config: &mut Config,
) -> Result<ApplyReport, HivepatchError> {
    ApplyEngine::new(store).apply(config)
}

/// Validate a config with a fresh engine.
pub fn validate(
    store: &mut dyn RegistryStore,
    config: &mut Config,
) -> Result<ApplyReport, HivepatchError> {
    ApplyEngine::new(store).validate(config)
}

// =============================================================================
// TESTS
// =============================================================================
