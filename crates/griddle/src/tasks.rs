use std::collections::HashMap;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::communication::Completion;
use crate::error::{GriddleError, Result};

/// State of a deferred request as seen by a poller.
#[derive(Debug)]
pub enum TaskStatus<O> {
    /// Unknown id, or a result that was already collected.
    NotFound,
    Pending,
    Ready(Result<O>),
}

impl<O> TaskStatus<O> {
    /// Folds the status into the error the HTTP layer reports for it.
    pub fn into_result(self) -> Result<O> {
        match self {
            TaskStatus::NotFound => Err(GriddleError::TaskNotFound),
            TaskStatus::Pending => Err(GriddleError::TaskNotDone),
            TaskStatus::Ready(result) => result,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }
}

/// # TaskRegistry
///
/// Detached completions, addressable by id.
///
/// Used for fire-and-poll requests: the handler defers the completion,
/// answers with the id right away, and a later request polls for the
/// result. A result can be collected once.
pub struct TaskRegistry<O> {
    tasks: Mutex<HashMap<Uuid, JoinHandle<Result<O>>>>,
}

impl<O> Default for TaskRegistry<O> {
    fn default() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl<O> TaskRegistry<O>
where O: Send + 'static
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Detaches `completion` into its own task and returns the id to poll.
    pub fn defer(&self, completion: Completion<O>) -> Uuid {
        let id = Uuid::new_v4();
        let handle = tokio::spawn(async move { Ok::<O, GriddleError>(completion.await??) });
        self.lock().insert(id, handle);
        debug!(task = %id, "deferred request");
        id
    }

    /// Checks on `id`, removing it once its result is handed out.
    pub async fn poll(&self, id: &Uuid) -> TaskStatus<O> {
        let handle = {
            let mut tasks = self.lock();
            let finished = match tasks.get(id) {
                None => return TaskStatus::NotFound,
                Some(handle) => handle.is_finished(),
            };
            if !finished {
                return TaskStatus::Pending;
            }
            tasks.remove(id)
        };

        let Some(handle) = handle else {
            return TaskStatus::NotFound;
        };
        match handle.await {
            Ok(result) => TaskStatus::Ready(result),
            Err(e) => {
                warn!(task = %id, error = %e, "deferred task did not complete");
                TaskStatus::Ready(Err(GriddleError::TaskFailed(e.to_string())))
            }
        }
    }

    /// Tasks not yet collected, finished or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no task is waiting to be collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, JoinHandle<Result<O>>>> {
        // a poisoned map is still structurally sound
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<O> Drop for TaskRegistry<O> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}
