use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::config::InFlightPolicy;
use crate::probe::Prober;
use crate::queue::WorkReceiver;

/// Everything a worker needs, shared by the whole pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub target: IpAddr,
    pub timeout: Duration,
    pub prober: Arc<dyn Prober>,
    pub results: Aggregator,
    pub cancel: CancellationToken,
    pub in_flight: InFlightPolicy,
}

/// Fixed-width set of workers draining one [`WorkReceiver`].
pub struct WorkerPool {
    set: JoinSet<usize>,
    width: usize,
}

impl WorkerPool {
    /// Start `width` workers. They block on the queue until it is closed and drained,
    /// or until the context's token is cancelled.
    pub fn spawn(width: usize, queue: WorkReceiver, ctx: WorkerContext) -> Self {
        let mut set = JoinSet::new();
        for id in 0..width {
            set.spawn(worker(id, queue.clone(), ctx.clone()));
        }
        Self { set, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Wait for every worker to exit. Returns the number of records resolved.
    pub async fn join(mut self) -> usize {
        let mut resolved = 0;
        while let Some(res) = self.set.join_next().await {
            match res {
                Ok(n) => resolved += n,
                Err(e) => warn!(error = %e, "scan worker failed"),
            }
        }
        resolved
    }
}

async fn worker(id: usize, queue: WorkReceiver, ctx: WorkerContext) -> usize {
    let mut resolved = 0usize;
    loop {
        let pending = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            next = queue.next() => match next {
                Some(p) => p,
                None => break,
            },
        };

        let _ack = queue.ack_on_drop();
        let probing = pending.begin();
        let addr = SocketAddr::new(ctx.target, probing.port());
        let open = match ctx.in_flight {
            InFlightPolicy::Finish => ctx.prober.probe(addr, ctx.timeout).await,
            InFlightPolicy::Abandon => {
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        debug!(worker = id, port = probing.port(), "abandoning in-flight probe");
                        break;
                    }
                    open = ctx.prober.probe(addr, ctx.timeout) => open,
                }
            }
        };

        ctx.results.submit(probing.resolve(open));
        resolved += 1;
    }
    debug!(worker = id, resolved, "worker exiting");
    resolved
}
