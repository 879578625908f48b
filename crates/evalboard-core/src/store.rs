//! In-memory run collection.
//!
//! `RunStore` owns the runs of one process. Readers never iterate the live
//! collection: [`RunStore::snapshot`] clones it under a read lock so filters
//! and statistics run against a fixed view while submissions keep appending.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::error::{EvalboardError, Result};
use crate::domain::run::EvaluationRun;
use crate::filter::{filter_runs, RunFilter};
use crate::obs;
use crate::stats::{summarize, DashboardStats};

/// Thread-safe, insertion-ordered run collection.
#[derive(Debug, Default)]
pub struct RunStore {
    runs: RwLock<Vec<EvaluationRun>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously recorded runs, rejecting duplicate ids.
    pub fn from_runs(runs: Vec<EvaluationRun>) -> Result<Self> {
        let store = Self::new();
        for run in runs {
            store.insert(run)?;
        }
        Ok(store)
    }

    /// Append a new run.
    pub fn insert(&self, run: EvaluationRun) -> Result<()> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        if runs.iter().any(|r| r.id() == run.id()) {
            return Err(EvalboardError::DuplicateRun(run.id()));
        }
        runs.push(run);
        Ok(())
    }

    /// Replace a stored run with its newer state.
    ///
    /// # Errors
    ///
    /// - `EvalboardError::RunNotFound`: no run with this id.
    /// - `EvalboardError::RunFinalized`: the stored run is already terminal.
    pub fn update(&self, run: &EvaluationRun) -> Result<()> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let slot = runs
            .iter_mut()
            .find(|r| r.id() == run.id())
            .ok_or(EvalboardError::RunNotFound(run.id()))?;
        if slot.is_terminal() {
            return Err(EvalboardError::RunFinalized(run.id()));
        }
        *slot = run.clone();
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<EvaluationRun> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the collection in insertion order.
    pub fn snapshot(&self) -> Vec<EvaluationRun> {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// All runs, newest first.
    pub fn list(&self) -> Vec<EvaluationRun> {
        let mut runs = self.snapshot();
        runs.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        runs
    }

    /// Runs matching `filter` at `now`, newest first.
    pub fn query(&self, filter: &RunFilter, now: DateTime<Utc>) -> Vec<EvaluationRun> {
        let runs = self.list();
        let matched = filter_runs(&runs, filter, now);
        obs::emit_filter_applied(runs.len(), matched.len());
        matched
    }

    /// Dashboard statistics over the current snapshot.
    pub fn stats(&self) -> DashboardStats {
        summarize(&self.snapshot())
    }
}
