//! Put hooks.
//!
//! Two kinds of hooks run around every [`Transaction::put`]:
//!
//! - **Model hooks**: a record type opts in by implementing [`BeforePut`]
//!   and/or [`AfterPut`] and enabling them with
//!   [`Hooks::with_model_before_put`] / [`Hooks::with_model_after_put`].
//!   The trait method is resolved to a function pointer at that point, not
//!   looked up on every write.
//! - **Global hooks**: closures registered with [`Hooks::before_put`] /
//!   [`Hooks::after_put`], run in registration order.
//!
//! On each side the model hook runs first, then the global list. The first
//! failure stops the sequence and aborts the put.

use std::fmt;

use sqlrepo_core::Record;

use crate::error::{BoxError, HookOrigin, HookStage, RepoError, Result};
use crate::tx::Transaction;

/// Outcome of a single hook.
pub type HookResult = std::result::Result<(), BoxError>;

type GlobalBeforePut<T> = Box<dyn Fn(&mut T, &Transaction<'_, T>) -> HookResult + Send + Sync>;
type GlobalAfterPut<T> = Box<dyn Fn(&T) -> HookResult + Send + Sync>;
type ModelBeforePut<T> = fn(&mut T, &Transaction<'_, T>) -> HookResult;
type ModelAfterPut<T> = fn(&T) -> HookResult;

/// Record-level hook run before the row is written.
///
/// The hook may adjust the record and issue companion writes through the
/// active transaction.
pub trait BeforePut: Record {
    fn before_put(&mut self, tx: &Transaction<'_, Self>) -> HookResult;
}

/// Record-level hook run after the row is written, before commit.
pub trait AfterPut: Record {
    fn after_put(&self) -> HookResult;
}

/// Hooks attached to a repository.
pub struct Hooks<T> {
    model_before_put: Option<ModelBeforePut<T>>,
    model_after_put: Option<ModelAfterPut<T>>,
    before_put: Vec<GlobalBeforePut<T>>,
    after_put: Vec<GlobalAfterPut<T>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            model_before_put: None,
            model_after_put: None,
            before_put: Vec::new(),
            after_put: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Hooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("model_before_put", &self.model_before_put.is_some())
            .field("model_after_put", &self.model_after_put.is_some())
            .field("before_put", &self.before_put.len())
            .field("after_put", &self.after_put.len())
            .finish()
    }
}

impl<T: Record> Hooks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a global hook run before every write.
    pub fn before_put<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T, &Transaction<'_, T>) -> HookResult + Send + Sync + 'static,
    {
        self.before_put.push(Box::new(hook));
        self
    }

    /// Appends a global hook run after every write.
    pub fn after_put<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> HookResult + Send + Sync + 'static,
    {
        self.after_put.push(Box::new(hook));
        self
    }

    /// Runs `T`'s [`BeforePut`] implementation ahead of the global list.
    pub fn with_model_before_put(mut self) -> Self
    where
        T: BeforePut,
    {
        self.model_before_put = Some(<T as BeforePut>::before_put);
        self
    }

    /// Runs `T`'s [`AfterPut`] implementation ahead of the global list.
    pub fn with_model_after_put(mut self) -> Self
    where
        T: AfterPut,
    {
        self.model_after_put = Some(<T as AfterPut>::after_put);
        self
    }

    pub(crate) fn run_before_put(&self, tx: &Transaction<'_, T>, model: &mut T) -> Result<()> {
        if let Some(hook) = self.model_before_put {
            hook(model, tx).map_err(|source| RepoError::Hook {
                stage: HookStage::BeforePut,
                origin: HookOrigin::Model,
                source,
            })?;
        }

        for (index, hook) in self.before_put.iter().enumerate() {
            hook(model, tx).map_err(|source| RepoError::Hook {
                stage: HookStage::BeforePut,
                origin: HookOrigin::Global(index),
                source,
            })?;
        }

        Ok(())
    }

    pub(crate) fn run_after_put(&self, model: &T) -> Result<()> {
        if let Some(hook) = self.model_after_put {
            hook(model).map_err(|source| RepoError::Hook {
                stage: HookStage::AfterPut,
                origin: HookOrigin::Model,
                source,
            })?;
        }

        for (index, hook) in self.after_put.iter().enumerate() {
            hook(model).map_err(|source| RepoError::Hook {
                stage: HookStage::AfterPut,
                origin: HookOrigin::Global(index),
                source,
            })?;
        }

        Ok(())
    }
}
