//! Template feed: per-chain server pool and streaming connections
//!
//! Each chain keeps a bounded pool of server addresses and a fixed number of
//! supervised connection slots. A slot takes a server from the pool, holds a
//! websocket subscription to its mining endpoint, and pushes every received
//! template into the store. When the connection dies for any reason the
//! server goes back into the pool and the slot dials again after a fixed
//! delay, so the pool size and the chain's connection coverage are conserved
//! across arbitrary disconnects.

use crate::crypto::Signer;
use crate::store::TemplateStore;
use crate::types::{BlockTemplate, MiningContext, ADDRESS_LEN};
use crate::wallet::Wallet;
use crate::{Error, Result};
use byteorder::{BigEndian, WriteBytesExt};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Per-message read deadline; a silent server forces a reconnect
const READ_DEADLINE: Duration = Duration::from_secs(120);

/// Fixed delay before a slot dials again after losing its connection
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Bounded pool of server addresses shared by a chain's connection slots
#[derive(Clone)]
pub struct ServerPool {
    tx: mpsc::Sender<String>,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl ServerPool {
    pub fn new(servers: &[String]) -> Self {
        let (tx, rx) = mpsc::channel(servers.len().max(1));
        for server in servers {
            tx.try_send(server.clone())
                .expect("pool channel sized to the server list");
        }
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Take a server out of the pool, waiting until one is available.
    pub async fn acquire(&self) -> String {
        let mut rx = self.rx.lock().await;
        rx.recv().await.expect("pool sender held by the pool itself")
    }

    /// Return a server to the pool.
    pub async fn release(&self, server: String) {
        // Cannot fail: the pool never outgrows its initial capacity.
        let _ = self.tx.send(server).await;
    }

    /// Servers currently checked in.
    pub fn available(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Template feed shared by all chains
pub struct TemplateFeed {
    store: Arc<TemplateStore>,
    signer: Arc<Signer>,
    primary: Wallet,
    secondary: Wallet,
}

impl TemplateFeed {
    pub fn new(
        store: Arc<TemplateStore>,
        signer: Arc<Signer>,
        primary: Wallet,
        secondary: Wallet,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            signer,
            primary,
            secondary,
        })
    }

    /// Spawn the connection slots for every configured chain.
    pub fn spawn(self: &Arc<Self>, chains: &[u64], servers: &[String], slots_per_chain: usize) {
        for &chain in chains {
            let pool = ServerPool::new(servers);
            for slot in 0..slots_per_chain {
                let feed = Arc::clone(self);
                let pool = pool.clone();
                tokio::spawn(async move {
                    feed.supervise_slot(chain, slot, pool).await;
                });
            }
        }
    }

    /// Supervisor loop for one connection slot.
    ///
    /// Owns the retry cycle: acquire a server, run the connection until it
    /// fails, give the server back, back off, repeat. Every failure mode of
    /// the connection ends up here as an error, so one bad connection never
    /// takes anything else down.
    pub async fn supervise_slot(self: Arc<Self>, chain: u64, slot: usize, pool: ServerPool) {
        loop {
            let server = pool.acquire().await;
            let result = self.run_connection(chain, &server).await;
            match result {
                Ok(()) => unreachable!("template connections only end in error"),
                Err(e) => warn!(
                    chain,
                    slot,
                    server = %server,
                    category = e.category(),
                    "disconnected from server: {e}"
                ),
            }
            pool.release(server).await;
            sleep(RECONNECT_DELAY).await;
        }
    }

    /// Hold one streaming connection until it fails.
    async fn run_connection(&self, chain: u64, server: &str) -> Result<()> {
        let url = format!("ws://{server}/api/v1/{chain}/ws/mining");
        let (mut ws, _) = connect_async(url.as_str()).await?;

        ws.send(Message::binary(self.auth_frame())).await?;
        info!(chain, server, "connected to template stream");

        loop {
            let message = timeout(READ_DEADLINE, ws.next())
                .await
                .map_err(|_| Error::timeout("template read"))?
                .ok_or_else(|| Error::network("template stream ended"))??;

            match message {
                Message::Text(_) | Message::Binary(_) => {
                    let template: BlockTemplate = serde_json::from_slice(&message.into_data())?;
                    self.accept(server, template);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                Message::Close(_) => {
                    return Err(Error::network("server closed template stream"))
                }
            }
        }
    }

    /// First frame on every connection: our address and the current time,
    /// followed by a signature over both with the primary key.
    fn auth_frame(&self) -> Vec<u8> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        let mut frame = Vec::with_capacity(ADDRESS_LEN + 8 + crate::crypto::SIGN_LEN);
        frame.extend_from_slice(self.primary.address.as_bytes());
        frame.write_i64::<BigEndian>(now).unwrap();
        let signature = self.signer.sign(&self.primary.key, &frame);
        frame.extend_from_slice(&signature);
        frame
    }

    /// Turn a received template into a mining context and offer it to the
    /// store. Every 4th block index is mined with the secondary identity.
    pub fn accept(&self, server: &str, template: BlockTemplate) {
        let secondary = template.header.index % 4 == 0;
        let wallet = if secondary {
            &self.secondary
        } else {
            &self.primary
        };

        let mut header = template.header;
        header.producer = wallet.address;

        debug!(
            chain = header.chain,
            index = header.index,
            limit = template.hashpower_limit,
            server,
            secondary,
            "received template"
        );

        self.store.put(MiningContext {
            header,
            limit: template.hashpower_limit,
            origin: server.to_string(),
            key: wallet.key,
            secondary,
        });
    }
}
