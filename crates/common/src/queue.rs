use std::sync::mpsc::{self, Receiver, Sender};

/// A unit of work queued from any thread and run on the frame thread.
pub type Task<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Returned when enqueueing into a queue whose frame loop has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task queue closed")]
pub struct QueueClosed;

/// Cross-thread task queue drained once per frame.
///
/// Other threads hold a [`TaskSender`] and may enqueue at any time. The frame
/// loop calls [`TaskQueue::process_pending`], which runs every task that was
/// queued before the drain began, in enqueue order, with mutable access to the
/// frame state. Tasks queued while a drain is running land in the next frame.
pub struct TaskQueue<S> {
    sender: Sender<Task<S>>,
    receiver: Receiver<Task<S>>,
}

/// Cloneable, `Send` handle for enqueueing work into a [`TaskQueue`].
pub struct TaskSender<S> {
    sender: Sender<Task<S>>,
}

impl<S> Clone for TaskSender<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S> TaskSender<S> {
    /// Queue `task` for the next frame.
    pub fn enqueue<F>(&self, task: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender.send(Box::new(task)).map_err(|_| QueueClosed)
    }
}

impl<S> TaskQueue<S> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> TaskSender<S> {
        TaskSender {
            sender: self.sender.clone(),
        }
    }

    /// Run every pending task against `state`. Returns how many ran.
    ///
    /// A task that blocks stalls the whole frame loop.
    pub fn process_pending(&mut self, state: &mut S) -> usize {
        let pending: Vec<Task<S>> = self.receiver.try_iter().collect();
        let count = pending.len();
        for task in pending {
            task(state);
        }
        if count > 0 {
            tracing::trace!(count, "processed queued tasks");
        }
        count
    }
}

impl<S> Default for TaskQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}
