//! The connection handler (§4.8): bootstraps the shared context, seeds the
//! pre-configured proxy mappings, spawns the dispatcher and the bounded
//! queues, and accepts TCP connections, handing each one to
//! [`session_task::run`].

mod as_path;
mod pdu_switch;
mod session_task;
mod shared;
mod sigtra;

pub use shared::Shared;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{PathCache, UpdateCache};
use crate::config::{self, Config};
use crate::dispatcher::{Dispatcher, DispatcherDeps};
use crate::proxy_map::ProxyMap;
use crate::queue::{BoundedQueue, ReceiveItem, ReceiveQueue, SendItem};
use crate::signer::Signer;
use crate::validators::{AspaValidator, BgpsecValidator, OriginValidator};

/// Validators and an optional signing key, injected by the caller. Real
/// RPKI-Router wiring and on-disk key loading are both out of scope for this
/// crate (spec.md §1); a caller supplies whatever it has (mocks in tests,
/// a loaded [`Signer`] and real validators in the binary).
pub struct HandlerDeps {
    pub origin: Arc<dyn OriginValidator>,
    pub bgpsec: Arc<dyn BgpsecValidator>,
    pub aspa: Arc<dyn AspaValidator>,
    pub signer: Option<Arc<Signer>>,
}

/// Owns every long-lived task the server runs for the lifetime of the
/// process: the dispatcher worker, the send/receive queue workers, the
/// periodic sweep, and — once [`ConnectionHandler::serve`] is called — the
/// accept loop and one task per connected proxy.
pub struct ConnectionHandler {
    shared: Arc<Shared>,
    receive_queue: Option<Arc<ReceiveQueue>>,
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl ConnectionHandler {
    /// Seeds the proxy map from `config.proxy_mappings` (`configureProxyMap`
    /// in `original_source/configuration.c`: pre-defined slots exist before
    /// any proxy connects and survive a clean disconnect), then spawns the
    /// dispatcher and the queue workers.
    pub fn build(config: &Config, deps: HandlerDeps) -> Self {
        let token = CancellationToken::new();
        let default_keep_window = Duration::from_secs(config.server.default_keep_window_secs as u64);
        let mut workers = Vec::new();

        let proxy_map = Arc::new(ProxyMap::new(default_keep_window));
        for (slot, proxy_id) in config::proxy_mapping_pairs(config) {
            if let Err(err) = proxy_map.add_mapping(proxy_id, slot, None, false) {
                warn!(slot, proxy_id, %err, "failed to seed pre-configured proxy mapping");
            }
        }

        let update_cache = Arc::new(UpdateCache::new());
        let path_cache = Arc::new(PathCache::new());

        let (send_queue, send_worker) = BoundedQueue::spawn(
            config.queues.send_capacity,
            token.clone(),
            move |item: SendItem| async move {
                if item.destination.send(item.pdu).await.is_err() {
                    tracing::debug!("send queue: destination session already gone");
                }
            },
        );
        let send_queue = Arc::new(send_queue);
        workers.push(send_worker);

        let dispatcher_deps = DispatcherDeps {
            update_cache: update_cache.clone(),
            path_cache: path_cache.clone(),
            proxy_map: proxy_map.clone(),
            origin: deps.origin,
            bgpsec: deps.bgpsec,
            aspa: deps.aspa,
            signer: deps.signer.clone().unwrap_or_else(|| Arc::new(Signer::generate())),
            send_queue: send_queue.clone(),
            local_as: config.server.local_asn,
        };
        let (dispatcher, dispatcher_worker) = Dispatcher::spawn(1024, token.clone(), dispatcher_deps);
        workers.push(dispatcher_worker);

        let shared = Arc::new(Shared {
            proxy_map,
            update_cache,
            path_cache,
            dispatcher: Arc::new(dispatcher),
            send_queue,
            signer: deps.signer,
            local_as: config.server.local_asn,
            default_keep_window,
            sync_after_conn_established: config.server.sync_after_conn_established,
        });

        let receive_queue = if config.queues.disable_receive_queue {
            None
        } else {
            let worker_shared = shared.clone();
            let (queue, worker) = BoundedQueue::spawn(
                config.queues.receive_capacity,
                token.clone(),
                move |item: ReceiveItem| {
                    let worker_shared = worker_shared.clone();
                    async move {
                        pdu_switch::handle_active_pdu(&worker_shared, item.slot, item.pdu).await;
                    }
                },
            );
            workers.push(worker);
            Some(Arc::new(queue))
        };

        ConnectionHandler {
            shared,
            receive_queue,
            token,
            workers,
        }
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// A token the caller can also hold (e.g. to cancel on `SIGTERM`)
    /// instead of going through [`Self::shutdown`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs the accept loop until cancelled, spawning one session task per
    /// accepted connection, and a periodic sweep of expired cache entries
    /// and crashed proxy-map rows (§3 lifecycle, §8 scenario 6) alongside it.
    pub async fn serve(&self, listener: TcpListener) {
        let sweep_shared = self.shared.clone();
        let sweep_token = self.token.clone();
        let sweep = tokio::spawn(sweep_loop(sweep_shared, sweep_token));

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    info!("connection handler shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!(%peer, "accepted connection");
                            let shared = self.shared.clone();
                            let receive_queue = self.receive_queue.clone();
                            tokio::spawn(async move {
                                session_task::run(shared, receive_queue, stream, peer).await;
                            });
                        }
                        Err(err) => warn!(%err, "accept failed"),
                    }
                }
            }
        }

        let _ = sweep.await;
    }

    /// Signals every spawned task (accept loop, sessions' queue consumers,
    /// dispatcher, sweep) to stop, and waits for the background workers
    /// spawned in [`Self::build`] to drain.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }
}

async fn sweep_loop(shared: Arc<Shared>, token: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                let now = std::time::Instant::now();
                shared.update_cache.sweep_expired(now);
                for slot in shared.proxy_map.sweep_expired(now) {
                    shared.update_cache.unregister_client_id(slot, Duration::from_secs(0));
                }
            }
        }
    }
}
