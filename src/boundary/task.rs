//! Module `task`
//!
//! Hosts every client's service on its own tokio task. The factory runs on
//! that task and all calls reach the service as messages, so a service that
//! panics takes down only its own task; its callers receive service faults.

use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::boundary::{BoundaryHandle, IsolationBoundary};
use crate::call::{CallEnvelope, CallResult, Fault};
use crate::error::{BoundaryError, ServiceError};
use crate::service::{RemoteService, ServiceFactory, ServiceRef};

const DEFAULT_QUEUE_DEPTH: usize = 64;

enum BoundaryCommand {
    Instantiate {
        factory: ServiceFactory,
        client_id: String,
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    Invoke {
        call: CallEnvelope,
        reply: oneshot::Sender<CallResult>,
    },
    Dispose {
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
}

struct BoundaryCell {
    tx: mpsc::Sender<BoundaryCommand>,
    task: JoinHandle<()>,
}

pub struct TaskBoundary {
    next_id: AtomicU64,
    queue_depth: usize,
    cells: Mutex<HashMap<u64, BoundaryCell>>,
}

impl Default for TaskBoundary {
    fn default() -> Self {
        Self::with_queue_depth(DEFAULT_QUEUE_DEPTH)
    }
}

impl TaskBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how many calls may wait on a single client's task.
    pub fn with_queue_depth(queue_depth: usize) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            queue_depth: queue_depth.max(1),
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn live_count(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn sender(&self, id: u64) -> Option<mpsc::Sender<BoundaryCommand>> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|cell| cell.tx.clone())
    }
}

/// The loop each boundary task runs until it is aborted or every sender is gone.
async fn run_boundary(mut rx: mpsc::Receiver<BoundaryCommand>) {
    let mut service: Option<Box<dyn RemoteService>> = None;

    while let Some(command) = rx.recv().await {
        match command {
            BoundaryCommand::Instantiate {
                factory,
                client_id,
                reply,
            } => {
                let result = factory(&client_id).map(|built| {
                    service = Some(built);
                });
                let _ = reply.send(result);
            }
            BoundaryCommand::Invoke { call, reply } => {
                let result = match service.as_ref() {
                    Some(service) => service.invoke(call).await,
                    None => Err(Fault::disposed("service")),
                };
                let _ = reply.send(result);
            }
            BoundaryCommand::Dispose { reply } => {
                let result = match service.take() {
                    Some(service) => service.dispose().await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
        }
    }
}

#[async_trait]
impl IsolationBoundary for TaskBoundary {
    fn kind(&self) -> &'static str {
        "task"
    }

    async fn create(&self, client_id: &str) -> Result<BoundaryHandle, BoundaryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let runtime = Handle::try_current()
            .map_err(|e| BoundaryError::CreateFailed(format!("{} for {}", e, client_id)))?;
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let task = runtime.spawn(run_boundary(rx));

        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, BoundaryCell { tx, task });

        debug!("Task boundary {} spawned for {}", id, client_id);
        Ok(BoundaryHandle::new(id, client_id))
    }

    async fn instantiate(
        &self,
        handle: &BoundaryHandle,
        factory: &ServiceFactory,
    ) -> Result<ServiceRef, BoundaryError> {
        let tx = self
            .sender(handle.id())
            .ok_or(BoundaryError::UnknownHandle(handle.id()))?;

        let (reply, response) = oneshot::channel();
        let command = BoundaryCommand::Instantiate {
            factory: Arc::clone(factory),
            client_id: handle.client_id().to_string(),
            reply,
        };
        if tx.send(command).await.is_err() {
            return Err(BoundaryError::Terminated(handle.client_id().to_string()));
        }

        match response.await {
            Ok(Ok(())) => Ok(Arc::new(TaskServiceRef {
                client_id: handle.client_id().to_string(),
                tx,
            })),
            Ok(Err(e)) => Err(BoundaryError::InstantiateFailed(e.to_string())),
            Err(_) => Err(BoundaryError::InstantiateFailed(format!(
                "boundary task for {} died during instantiation",
                handle.client_id()
            ))),
        }
    }

    async fn teardown(&self, handle: BoundaryHandle) -> Result<(), BoundaryError> {
        let cell = self
            .cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id())
            .ok_or(BoundaryError::UnknownHandle(handle.id()))?;

        cell.task.abort();
        match cell.task.await {
            Err(e) if e.is_panic() => {
                warn!(
                    "Task boundary {} for {} had panicked before teardown",
                    handle.id(),
                    handle.client_id()
                );
            }
            _ => debug!("Task boundary {} torn down", handle.id()),
        }
        Ok(())
    }
}

/// Service reference handed out by `TaskBoundary`; every call is a message.
struct TaskServiceRef {
    client_id: String,
    tx: mpsc::Sender<BoundaryCommand>,
}

impl TaskServiceRef {
    fn terminated(&self) -> Fault {
        Fault::service(format!("boundary for {} has terminated", self.client_id))
    }
}

#[async_trait]
impl RemoteService for TaskServiceRef {
    async fn invoke(&self, call: CallEnvelope) -> CallResult {
        let (reply, response) = oneshot::channel();
        if self
            .tx
            .send(BoundaryCommand::Invoke { call, reply })
            .await
            .is_err()
        {
            return Err(self.terminated());
        }
        response.await.unwrap_or_else(|_| Err(self.terminated()))
    }

    async fn dispose(&self) -> Result<(), ServiceError> {
        let (reply, response) = oneshot::channel();
        if self
            .tx
            .send(BoundaryCommand::Dispose { reply })
            .await
            .is_err()
        {
            return Err(ServiceError::DisposeFailed(self.terminated().message));
        }
        response
            .await
            .unwrap_or_else(|_| Err(ServiceError::DisposeFailed(self.terminated().message)))
    }
}
