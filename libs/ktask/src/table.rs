// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use sched_lock::Spinlock;

use crate::error::Error;
use crate::id::TaskId;
use crate::services::TaskRegistry;
use crate::task::TaskControl;

/// A simple [`TaskRegistry`]: an ordered map of live tasks plus the running task.
///
/// There is a single "running" slot, i.e. this models one CPU's ready-to-run head. Kernels with
/// per-CPU run queues implement [`TaskRegistry`] on top of those instead.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: Spinlock<BTreeMap<TaskId, Arc<TaskControl>>>,
    running: Spinlock<Option<Arc<TaskControl>>>,
}

impl TaskTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] for [`TaskId::CALLER`] and [`Error::AlreadyExists`] if the
    /// identifier is taken.
    pub fn insert(&self, task: Arc<TaskControl>) -> Result<(), Error> {
        let id = task.id();
        if id.is_caller() {
            return Err(Error::InvalidId);
        }

        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&id) {
            return Err(Error::AlreadyExists);
        }
        tasks.insert(id, task);
        tracing::trace!(%id, "registered task");

        Ok(())
    }

    /// Unregisters a task, returning its control record.
    ///
    /// If the task was the running one, the running slot is cleared as well.
    pub fn remove(&self, id: TaskId) -> Option<Arc<TaskControl>> {
        let task = self.tasks.lock().remove(&id)?;

        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| r.id() == id) {
            *running = None;
        }
        tracing::trace!(%id, "unregistered task");

        Some(task)
    }

    /// Makes the task registered under `id` the running task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such task is registered.
    pub fn switch_to(&self, id: TaskId) -> Result<(), Error> {
        let task = self.get(id).ok_or(Error::NotFound)?;
        *self.running.lock() = Some(task);
        Ok(())
    }

    pub fn get(&self, id: TaskId) -> Option<Arc<TaskControl>> {
        self.tasks.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl TaskRegistry for TaskTable {
    type Handle = Arc<TaskControl>;

    fn lookup(&self, id: TaskId) -> Option<Self::Handle> {
        self.get(id)
    }

    /// Returns the task last made running with [`TaskTable::switch_to`].
    ///
    /// # Panics
    ///
    /// Panics if no task is running, i.e. [`TaskTable::switch_to`] was never called or the
    /// running task has been removed since.
    fn current_task(&self) -> Self::Handle {
        self.running
            .lock()
            .clone()
            .expect("no task is running on this CPU")
    }
}
