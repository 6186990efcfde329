//! Short-lived RPC exchanges with the coordinator.
//!
//! Every exchange owns its connection: connect (bounded), send one framed
//! request, optionally await the response, disconnect. The coordinator
//! sees discrete sessions and keeps no per-client connection state
//! between them. At most one exchange is outstanding per brokerage
//! instance.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::{debug, warn};

use fbuild_proto::error::{BrokerageError, BrokerageResult};
use fbuild_proto::message::{CoordinatorRequest, CoordinatorResponse};

use crate::net;

/// One-shot rendezvous carrying a worker-list response from the wire
/// reader task to the control task.
///
/// The reader publishes the list under the mutex and signals the notify;
/// the control task takes the list exactly once. Releasing the mutex
/// before the ready flag is observed gives the required happens-before
/// edge, so the transfer is safe from any task or thread.
pub struct ListRendezvous {
    pending: Mutex<Pending>,
    notify: Notify,
}

#[derive(Default)]
struct Pending {
    list: Vec<u32>,
    ready: bool,
}

impl ListRendezvous {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            notify: Notify::new(),
        }
    }

    /// Discard any stale delivery before a new request goes out.
    pub fn reset(&self) {
        let mut pending = self.pending.lock().unwrap();
        pending.list.clear();
        pending.ready = false;
    }

    /// Publish a worker list and wake the waiting control task. Takes
    /// ownership of the address list.
    pub fn deliver(&self, mut list: Vec<u32>) {
        {
            let mut pending = self.pending.lock().unwrap();
            std::mem::swap(&mut pending.list, &mut list);
            pending.ready = true;
        }
        self.notify.notify_one();
    }

    /// Wait until a list has been delivered, then take it. The delivery
    /// is consumed: a second wait blocks until the next `deliver`.
    pub async fn wait(&self) -> Vec<u32> {
        loop {
            {
                let mut pending = self.pending.lock().unwrap();
                if pending.ready {
                    pending.ready = false;
                    return std::mem::take(&mut pending.list);
                }
            }
            self.notify.notified().await;
        }
    }
}

impl Default for ListRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

/// Client side of a coordinator exchange.
pub struct CoordinatorClient {
    address: String,
    port: u16,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl CoordinatorClient {
    pub fn new(
        address: String,
        port: u16,
        connect_timeout: Duration,
        response_timeout: Duration,
    ) -> Self {
        Self {
            address,
            port,
            connect_timeout,
            response_timeout,
        }
    }

    /// Request the current worker list.
    ///
    /// Sends `RequestWorkerList`, then waits for the wire reader task to
    /// publish the response through `rendezvous`, bounded by the response
    /// timeout. The connection and the reader are torn down on every exit
    /// path, success or not.
    pub async fn request_worker_list(
        &self,
        rendezvous: Arc<ListRendezvous>,
    ) -> BrokerageResult<Vec<u32>> {
        let mut stream = self.connect().await?;

        rendezvous.reset();
        debug!("requesting worker list");
        net::send_msg(&mut stream, &CoordinatorRequest::RequestWorkerList).await?;

        // The reader decodes the single response frame and publishes it;
        // aborting it drops the stream and ends the session.
        let delivery = rendezvous.clone();
        let reader = tokio::spawn(async move {
            match net::read_msg::<CoordinatorResponse>(&mut stream).await {
                Ok(CoordinatorResponse::WorkerList(addrs)) => delivery.deliver(addrs),
                Err(e) => debug!("coordinator connection lost: {}", e),
            }
        });

        let result = tokio::time::timeout(self.response_timeout, rendezvous.wait()).await;
        reader.abort();
        debug!("disconnected from coordinator");

        match result {
            Ok(list) => Ok(list),
            Err(_) => {
                warn!(
                    "coordinator at {} accepted the request but never replied",
                    self.address
                );
                Err(BrokerageError::ResponseTimeout)
            }
        }
    }

    /// Push this worker's availability flag. Fire-and-forget: the
    /// connection is torn down right after the send and no response is
    /// awaited.
    pub async fn set_worker_status(&self, available: bool) -> BrokerageResult<()> {
        let mut stream = self.connect().await?;
        net::send_msg(&mut stream, &CoordinatorRequest::SetWorkerStatus { available }).await?;
        debug!("sent worker status: available={}", available);
        Ok(())
    }

    async fn connect(&self) -> BrokerageResult<TcpStream> {
        match net::connect_with_timeout(&self.address, self.port, self.connect_timeout).await {
            Ok(stream) => {
                debug!("connected to coordinator at {}", self.address);
                Ok(stream)
            }
            Err(e) => {
                warn!("failed to connect to coordinator at {}: {}", self.address, e);
                Err(e)
            }
        }
    }
}
