//! # rehome-client
//!
//! Async client for the rehome protocol, built around one hard problem:
//! **data-center migration**. When a call lands on the wrong data center the
//! server answers with a redirect instead of a result; the client then
//! resolves the target's endpoints from the live configuration table,
//! persists them under the precedence rules, tears the session down,
//! exchanges a fresh authorization key against the new endpoint, persists
//! the key, starts a new session, and retries the original call — all
//! invisibly to the caller.
//!
//! ## Features
//! - Transparent migration with a configurable hop bound
//! - Per-client migration lock with single-flight coalescing
//! - Pluggable endpoint persistence: binary file, in-memory, SQLite
//! - IPv4/IPv6 endpoint selection and dedicated media endpoints
//! - Session persistence and key reuse across restarts

#![deny(unsafe_code)]

mod auth;
mod conn;
mod errors;
mod policy;
pub mod reconcile;
pub mod store;
mod transport;

pub use errors::{InvocationError, MigrationSignal, Outcome, RpcError};
pub use policy::{HopLimit, MigrationContext, MigrationPolicy, NoMigrations, Unbounded};
pub use store::{EndpointState, EndpointStore, Field, FileBackend, MemoryBackend, StateBackend};
#[cfg(feature = "sqlite-store")]
pub use store::SqliteBackend;
pub use transport::FramedStream;

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::sync::Arc;

use rehome_tl as tl;
use rehome_tl::{Deserializable, RemoteCall};
use tokio::sync::Mutex;
use tokio::time::sleep;

use conn::Connection;

// ─── Config ───────────────────────────────────────────────────────────────────

/// Configuration for [`Client::connect`].
#[derive(Clone)]
pub struct Config {
    /// Application id presented on guarded calls.
    pub api_id: i32,
    /// Application hash presented on guarded calls.
    pub api_hash: String,
    /// Bootstrap data center, used only when the backend holds no state yet.
    pub home_dc_id: i32,
    /// Bootstrap address for `home_dc_id`.
    pub home_address: String,
    /// Bootstrap port for `home_dc_id`.
    pub home_port: u16,
    /// Run against the test endpoint/key namespace.
    pub test_mode: bool,
    /// Prefer IPv6 endpoint fields when both are known.
    pub prefer_ipv6: bool,
    /// How many migration hops a single call may take (default: 5).
    pub policy: Arc<dyn MigrationPolicy>,
    /// Endpoint persistence backend (default: binary file `"rehome.state"`).
    pub backend: Arc<dyn StateBackend>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            home_dc_id: 1,
            home_address: String::new(),
            home_port: 443,
            test_mode: false,
            prefer_ipv6: false,
            policy: Arc::new(HopLimit::default()),
            backend: Arc::new(FileBackend::new("rehome.state")),
        }
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// The active session plus a generation counter.
///
/// The mutex around this is the per-client migration lock. The generation
/// bumps on every session replacement, which is what lets concurrent callers
/// coalesce: a caller that observed generation `g` only migrates if the slot
/// still carries `g` — otherwise someone already did the work.
struct SessionSlot {
    conn: Option<Connection>,
    generation: u64,
}

struct ClientInner {
    store: EndpointStore,
    slot: Mutex<SessionSlot>,
    api_id: i32,
    api_hash: String,
    prefer_ipv6: bool,
    policy: Arc<dyn MigrationPolicy>,
}

/// The rehome client. Cheap to clone — internally Arc-wrapped.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    // ── Connect ────────────────────────────────────────────────────────────

    /// Load (or bootstrap) the endpoint state, ensure an authorization key
    /// exists for the active data center, and start a session.
    ///
    /// When the backend holds a key from a previous run it is reused; a key
    /// the server no longer accepts is replaced with a fresh exchange once,
    /// then the failure propagates.
    pub async fn connect(config: Config) -> Result<Self, InvocationError> {
        let store = EndpointStore::open(config.backend.clone(), || {
            EndpointState::bootstrap(
                config.home_dc_id,
                config.test_mode,
                config.home_address.clone(),
                config.home_port,
            )
        })?;
        tracing::info!(backend = config.backend.name(), "connecting");

        let state = store.snapshot().await;
        let addr = state
            .server_socket_addr(config.prefer_ipv6)
            .ok_or(InvocationError::UnknownDc(state.dc_id))?;

        let had_stored_key = state.auth_key.is_some();
        let key = match state.auth_key {
            Some(key) => key,
            None => {
                let key = auth::create_key(state.dc_id, state.test_mode, &addr).await?;
                store.set_auth_key(key).await?;
                key
            }
        };

        let conn = Connection::connect(state.dc_id, key, &addr).await?;
        let client = Self {
            inner: Arc::new(ClientInner {
                store,
                slot: Mutex::new(SessionSlot { conn: Some(conn), generation: 0 }),
                api_id: config.api_id,
                api_hash: config.api_hash,
                prefer_ipv6: config.prefer_ipv6,
                policy: config.policy,
            }),
        };

        // A stored key the server has forgotten only shows up once traffic
        // flows; probe now so the failure lands here and a fresh exchange
        // can repair it, instead of surfacing on the first user call.
        if had_stored_key {
            if let Err(e) = client.get_config().await {
                if matches!(e, InvocationError::Rpc(_)) {
                    return Err(e);
                }
                tracing::warn!(error = %e, "stored key rejected, performing fresh exchange");
                let key = auth::create_key(state.dc_id, state.test_mode, &addr).await?;
                client.inner.store.set_auth_key(key).await?;
                let mut slot = client.inner.slot.lock().await;
                if let Some(old) = slot.conn.take() {
                    old.close().await;
                }
                slot.conn = Some(Connection::connect(state.dc_id, key, &addr).await?);
                slot.generation += 1;
                drop(slot);
                client.get_config().await?;
            }
        }

        Ok(client)
    }

    // ── Public calls ───────────────────────────────────────────────────────

    /// Ask the server to send a login code to `phone`.
    ///
    /// The guarded call: its failure mode includes the migration signal, so
    /// this is the call that exercises the whole cycle. The number is
    /// normalized first (whitespace and a leading `+` stripped).
    pub async fn send_code(&self, phone: &str) -> Result<tl::types::SentCode, InvocationError> {
        let digits: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
        let phone_number = digits.strip_prefix('+').unwrap_or(&digits).to_string();
        self.invoke(&tl::functions::SendCode {
            phone_number,
            api_id: self.inner.api_id,
            api_hash: self.inner.api_hash.clone(),
        })
        .await
    }

    /// Fetch the current server configuration table.
    pub async fn get_config(&self) -> Result<tl::types::Config, InvocationError> {
        self.invoke(&tl::functions::GetConfig {}).await
    }

    /// Live-fetch the full endpoint option table, unfiltered.
    ///
    /// Filtering by data-center id is the caller's job; the table is never
    /// cached client-side.
    pub async fn fetch_dc_options(&self) -> Result<Vec<tl::types::DcOption>, InvocationError> {
        Ok(self.get_config().await?.dc_options)
    }

    /// A copy of the current endpoint state.
    pub async fn endpoint_state(&self) -> EndpointState {
        self.inner.store.snapshot().await
    }

    /// Gracefully tear down the active session.
    ///
    /// Safe to call more than once; later RPC attempts fail with
    /// [`InvocationError::NotConnected`].
    pub async fn disconnect(&self) {
        let mut slot = self.inner.slot.lock().await;
        if let Some(conn) = slot.conn.take() {
            conn.close().await;
        }
        slot.generation += 1;
        tracing::info!("disconnected");
    }

    // ── Raw invoke ─────────────────────────────────────────────────────────

    /// Invoke any RPC function, transparently following migration signals.
    ///
    /// A migration cycle writes endpoint fields and the new key through the
    /// persistence boundary as it goes; a cycle that fails (or a dropped
    /// future) rolls nothing back — the next completed cycle repairs the
    /// state.
    pub async fn invoke<R: RemoteCall>(&self, req: &R) -> Result<R::Return, InvocationError> {
        let body = self.call_raw(req).await?;
        R::Return::from_bytes(&body).map_err(Into::into)
    }

    /// The migration coordinator: issue, classify, maybe migrate, reissue.
    async fn call_raw<R: RemoteCall>(&self, req: &R) -> Result<Vec<u8>, InvocationError> {
        let mut hops = 0u32;
        loop {
            let (outcome, seen_generation) = {
                let mut slot = self.inner.slot.lock().await;
                let generation = slot.generation;
                let conn = slot.conn.as_mut().ok_or(InvocationError::NotConnected)?;
                (conn.invoke(req).await, generation)
            };

            match outcome {
                Outcome::Response(body) => return Ok(body),
                Outcome::Error(e) => return Err(e),
                Outcome::MigrationNeeded(signal) => {
                    hops += 1;
                    tracing::info!(%signal, hop = hops, "migration signal");
                    let ctx = MigrationContext {
                        hop_count: NonZeroU32::new(hops).unwrap(),
                        target_dc: signal.dc_id(),
                        signal,
                    };
                    match self.inner.policy.on_migration(&ctx) {
                        ControlFlow::Break(()) => {
                            return Err(InvocationError::MigrationLimit { attempts: hops });
                        }
                        ControlFlow::Continue(delay) => {
                            if !delay.is_zero() {
                                sleep(delay).await;
                            }
                        }
                    }
                    self.migrate_to(signal.dc_id(), seen_generation).await?;
                }
            }
        }
    }

    // ── Migration cycle ────────────────────────────────────────────────────

    /// One full migration cycle: resolve → reconcile → stop → exchange →
    /// persist key → start.
    ///
    /// Runs under the session-slot mutex, which is the migration lock. If
    /// another caller already replaced the session (generation moved past
    /// `seen_generation`), this cycle is skipped and the caller simply
    /// retries on the new session.
    async fn migrate_to(&self, dc_id: i32, seen_generation: u64) -> Result<(), InvocationError> {
        let mut slot = self.inner.slot.lock().await;
        if slot.generation != seen_generation {
            tracing::debug!(dc_id, "migration already done by another caller");
            return Ok(());
        }
        tracing::info!(dc_id, "migrating");

        // Resolve the configuration table over the *current* session. A
        // migrate error here is not consumed: the resolver's contract is
        // that fetch failures propagate as plain errors.
        let options = {
            let conn = slot.conn.as_mut().ok_or(InvocationError::NotConnected)?;
            match conn.invoke(&tl::functions::GetConfig {}).await {
                Outcome::Response(body) => tl::types::Config::from_bytes(&body)?.dc_options,
                Outcome::MigrationNeeded(signal) => {
                    return Err(InvocationError::Rpc(signal.into_rpc_error()));
                }
                Outcome::Error(e) => return Err(e),
            }
        };
        tracing::debug!(options = options.len(), "configuration resolved");

        self.inner.store.apply_dc_options(dc_id, &options).await?;

        if let Some(conn) = slot.conn.take() {
            conn.close().await;
        }

        self.inner.store.set_dc_id(dc_id).await?;

        // The exchange must see the post-reconciliation endpoint.
        let state = self.inner.store.snapshot().await;
        let addr = state
            .server_socket_addr(self.inner.prefer_ipv6)
            .ok_or(InvocationError::UnknownDc(dc_id))?;

        let key = auth::create_key(dc_id, state.test_mode, &addr).await?;
        self.inner.store.set_auth_key(key).await?;

        let conn = Connection::connect(dc_id, key, &addr).await?;
        tracing::info!(dc_id = conn.dc_id(), addr = %addr, "migration complete");
        slot.conn = Some(conn);
        slot.generation += 1;
        Ok(())
    }
}
