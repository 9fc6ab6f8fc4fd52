//! Persistent per-client endpoint and auth state.
//!
//! [`EndpointState`] is the record itself; [`StateBackend`] abstracts over
//! where it lives so callers can swap in an SQLite store, a compact binary
//! file, or an in-memory store. [`EndpointStore`] wraps both behind async
//! accessors and persists every field write individually — the write
//! *sequence* is not transactional, which is a documented property of the
//! migration flow, not an accident.
//!
//! Built-in backends:
//! * [`FileBackend`] — compact binary file (default choice).
//! * [`MemoryBackend`] — nothing on disk; useful for tests and throwaway runs.
//! * `SqliteBackend` — SQLite, one column per field (requires the
//!   `sqlite-store` Cargo feature).

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::errors::InvocationError;
use crate::reconcile;
use rehome_tl::types::DcOption;

// ─── Field ────────────────────────────────────────────────────────────────────

/// One independently persisted field of [`EndpointState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    /// The active data-center id.
    DcId,
    /// Whether the client runs against the test namespace.
    TestMode,
    /// The authorization key for the active DC.
    AuthKey,
    /// General RPC address, IPv4.
    ServerAddress,
    /// General RPC address, IPv6.
    ServerAddressV6,
    /// General RPC port.
    ServerPort,
    /// Media address, IPv4.
    MediaAddress,
    /// Media address, IPv6.
    MediaAddressV6,
    /// Media port.
    MediaPort,
}

impl Field {
    /// Stable name, used for logs and as the SQLite column name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DcId => "dc_id",
            Self::TestMode => "test_mode",
            Self::AuthKey => "auth_key",
            Self::ServerAddress => "server_address",
            Self::ServerAddressV6 => "server_address_v6",
            Self::ServerPort => "server_port",
            Self::MediaAddress => "media_address",
            Self::MediaAddressV6 => "media_address_v6",
            Self::MediaPort => "media_port",
        }
    }
}

// ─── EndpointState ────────────────────────────────────────────────────────────

/// The client's persistent record: which DC it belongs to, how to reach it,
/// and the key securing traffic with it.
///
/// Exactly one `dc_id` is active at a time; every address field describes
/// that DC, and `auth_key` is meaningful only for it. Mutated exclusively by
/// the reconciler and the key-exchange path during migration.
#[derive(Clone, PartialEq)]
pub struct EndpointState {
    /// The active data-center id.
    pub dc_id: i32,
    /// Test-namespace flag. Read-only during migration.
    pub test_mode: bool,
    /// General RPC address, IPv4.
    pub server_address: Option<String>,
    /// General RPC address, IPv6.
    pub server_address_v6: Option<String>,
    /// General RPC port.
    pub server_port: Option<u16>,
    /// Media address, IPv4.
    pub media_address: Option<String>,
    /// Media address, IPv6.
    pub media_address_v6: Option<String>,
    /// Media port.
    pub media_port: Option<u16>,
    /// Authorization key for the active DC.
    pub auth_key: Option<[u8; 256]>,
}

impl EndpointState {
    /// A fresh record pointing at a bootstrap endpoint, with no key yet.
    pub fn bootstrap(dc_id: i32, test_mode: bool, address: String, port: u16) -> Self {
        Self {
            dc_id,
            test_mode,
            server_address: Some(address),
            server_address_v6: None,
            server_port: Some(port),
            media_address: None,
            media_address_v6: None,
            media_port: None,
            auth_key: None,
        }
    }

    /// The `address:port` string for the general RPC endpoint, choosing the
    /// IPv6 or IPv4 field by preference (falling back to the other when the
    /// preferred one is absent). `None` when no address is known at all.
    pub fn server_socket_addr(&self, prefer_ipv6: bool) -> Option<String> {
        let addr = if prefer_ipv6 {
            self.server_address_v6.as_deref().or(self.server_address.as_deref())
        } else {
            self.server_address.as_deref().or(self.server_address_v6.as_deref())
        }?;
        let port = self.server_port.unwrap_or(443);
        Some(if addr.contains(':') {
            format!("[{addr}]:{port}")
        } else {
            format!("{addr}:{port}")
        })
    }
}

impl fmt::Debug for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointState")
            .field("dc_id", &self.dc_id)
            .field("test_mode", &self.test_mode)
            .field("server_address", &self.server_address)
            .field("server_address_v6", &self.server_address_v6)
            .field("server_port", &self.server_port)
            .field("media_address", &self.media_address)
            .field("media_address_v6", &self.media_address_v6)
            .field("media_port", &self.media_port)
            .field("auth_key", &self.auth_key.map(|_| "<256 bytes>"))
            .finish()
    }
}

// ─── StateBackend ─────────────────────────────────────────────────────────────

/// An abstraction over where and how endpoint state is persisted.
///
/// `persist` receives the full state plus the field that changed, so a
/// backend can choose between rewriting the whole record (file) and updating
/// a single column (SQLite). Each call must be individually durable.
pub trait StateBackend: Send + Sync {
    /// Persist `state` after a write to `field`.
    fn persist(&self, state: &EndpointState, field: Field) -> io::Result<()>;

    /// Load the previously persisted state, or `None` if there is none.
    fn load(&self) -> io::Result<Option<EndpointState>>;

    /// Remove the stored state.
    fn clear(&self) -> io::Result<()>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;
}

// ─── MemoryBackend ────────────────────────────────────────────────────────────

/// An ephemeral backend that stores nothing on disk.
///
/// Records the order of field writes, which tests use to observe the
/// persistence trail of a reconciliation.
pub struct MemoryBackend {
    data: std::sync::Mutex<Option<EndpointState>>,
    log: std::sync::Mutex<Vec<Field>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self {
            data: std::sync::Mutex::new(None),
            log: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every `Field` passed to [`StateBackend::persist`], in call order.
    pub fn persist_log(&self) -> Vec<Field> {
        self.log.lock().unwrap().clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBackend for MemoryBackend {
    fn persist(&self, state: &EndpointState, field: Field) -> io::Result<()> {
        *self.data.lock().unwrap() = Some(state.clone());
        self.log.lock().unwrap().push(field);
        Ok(())
    }

    fn load(&self) -> io::Result<Option<EndpointState>> {
        Ok(self.data.lock().unwrap().clone())
    }

    fn clear(&self) -> io::Result<()> {
        *self.data.lock().unwrap() = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

// ─── FileBackend ──────────────────────────────────────────────────────────────

/// The default backend — a compact binary file.
///
/// Every persist rewrites the file through a rename, so each field write is
/// atomic on its own even though the migration sequence as a whole is not.
pub struct FileBackend {
    path: PathBuf,
}

const FILE_MAGIC: &[u8; 4] = b"RHS1";

impl FileBackend {
    /// Create a backend storing at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn encode(state: &EndpointState) -> Vec<u8> {
        fn put_str(b: &mut Vec<u8>, s: &Option<String>) {
            match s {
                Some(s) => {
                    b.push(1);
                    b.extend_from_slice(&(s.len() as u16).to_le_bytes());
                    b.extend_from_slice(s.as_bytes());
                }
                None => b.push(0),
            }
        }
        fn put_port(b: &mut Vec<u8>, p: &Option<u16>) {
            match p {
                Some(p) => {
                    b.push(1);
                    b.extend_from_slice(&p.to_le_bytes());
                }
                None => b.push(0),
            }
        }

        let mut b = Vec::new();
        b.extend_from_slice(FILE_MAGIC);
        b.extend_from_slice(&state.dc_id.to_le_bytes());
        b.push(state.test_mode as u8);
        put_str(&mut b, &state.server_address);
        put_str(&mut b, &state.server_address_v6);
        put_port(&mut b, &state.server_port);
        put_str(&mut b, &state.media_address);
        put_str(&mut b, &state.media_address_v6);
        put_port(&mut b, &state.media_port);
        match &state.auth_key {
            Some(k) => {
                b.push(1);
                b.extend_from_slice(k);
            }
            None => b.push(0),
        }
        b
    }

    fn decode(buf: &[u8]) -> io::Result<EndpointState> {
        let mut p = 0usize;
        macro_rules! r {
            ($n:expr) => {{
                if p + $n > buf.len() {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated state file"));
                }
                let s = &buf[p..p + $n];
                p += $n;
                s
            }};
        }
        macro_rules! r_str {
            () => {{
                if r!(1)[0] == 1 {
                    let len = u16::from_le_bytes(r!(2).try_into().unwrap()) as usize;
                    Some(String::from_utf8_lossy(r!(len)).into_owned())
                } else {
                    None
                }
            }};
        }
        macro_rules! r_port {
            () => {{
                if r!(1)[0] == 1 {
                    Some(u16::from_le_bytes(r!(2).try_into().unwrap()))
                } else {
                    None
                }
            }};
        }

        if r!(4) != FILE_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad state file magic"));
        }
        let dc_id = i32::from_le_bytes(r!(4).try_into().unwrap());
        let test_mode = r!(1)[0] == 1;
        let server_address = r_str!();
        let server_address_v6 = r_str!();
        let server_port = r_port!();
        let media_address = r_str!();
        let media_address_v6 = r_str!();
        let media_port = r_port!();
        let auth_key = if r!(1)[0] == 1 {
            let mut k = [0u8; 256];
            k.copy_from_slice(r!(256));
            Some(k)
        } else {
            None
        };

        Ok(EndpointState {
            dc_id,
            test_mode,
            server_address,
            server_address_v6,
            server_port,
            media_address,
            media_address_v6,
            media_port,
            auth_key,
        })
    }
}

impl StateBackend for FileBackend {
    fn persist(&self, state: &EndpointState, _field: Field) -> io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, Self::encode(state))?;
        std::fs::rename(&tmp, &self.path)
    }

    fn load(&self) -> io::Result<Option<EndpointState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Self::decode(&std::fs::read(&self.path)?).map(Some)
    }

    fn clear(&self) -> io::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "binary-file"
    }
}

// ─── SqliteBackend ────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite-store")]
pub use sqlite_store::SqliteBackend;

#[cfg(feature = "sqlite-store")]
mod sqlite_store {
    use super::*;
    use rusqlite::{params, Connection};

    fn to_io(e: rusqlite::Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, e)
    }

    /// SQLite-backed endpoint store: a single row with one column per
    /// [`Field`], so a single-field write stays a single-column update.
    ///
    /// Enable with the `sqlite-store` Cargo feature:
    /// ```toml
    /// [dependencies]
    /// rehome-client = { version = "*", features = ["sqlite-store"] }
    /// ```
    pub struct SqliteBackend {
        path: PathBuf,
    }

    impl SqliteBackend {
        /// Open (and initialise) the database at `path`.
        pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
            let path = path.into();
            // Initialise the schema immediately so errors surface early.
            let conn = Connection::open(&path).map_err(to_io)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS endpoint (
                    id                INTEGER PRIMARY KEY CHECK (id = 0),
                    dc_id             INTEGER NOT NULL,
                    test_mode         INTEGER NOT NULL,
                    server_address    TEXT,
                    server_address_v6 TEXT,
                    server_port       INTEGER,
                    media_address     TEXT,
                    media_address_v6  TEXT,
                    media_port        INTEGER,
                    auth_key          BLOB
                );",
            )
            .map_err(to_io)?;
            Ok(Self { path })
        }
    }

    impl StateBackend for SqliteBackend {
        fn persist(&self, state: &EndpointState, field: Field) -> io::Result<()> {
            let conn = Connection::open(&self.path).map_err(to_io)?;
            conn.execute(
                "INSERT OR IGNORE INTO endpoint
                    (id, dc_id, test_mode, server_address, server_address_v6,
                     server_port, media_address, media_address_v6, media_port, auth_key)
                 VALUES (0, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    state.dc_id,
                    state.test_mode as i32,
                    state.server_address,
                    state.server_address_v6,
                    state.server_port,
                    state.media_address,
                    state.media_address_v6,
                    state.media_port,
                    state.auth_key.map(|k| k.to_vec()),
                ],
            )
            .map_err(to_io)?;

            let sql = format!("UPDATE endpoint SET {} = ?1 WHERE id = 0", field.name());
            match field {
                Field::DcId => conn.execute(&sql, params![state.dc_id]),
                Field::TestMode => conn.execute(&sql, params![state.test_mode as i32]),
                Field::AuthKey => conn.execute(&sql, params![state.auth_key.map(|k| k.to_vec())]),
                Field::ServerAddress => conn.execute(&sql, params![state.server_address]),
                Field::ServerAddressV6 => conn.execute(&sql, params![state.server_address_v6]),
                Field::ServerPort => conn.execute(&sql, params![state.server_port]),
                Field::MediaAddress => conn.execute(&sql, params![state.media_address]),
                Field::MediaAddressV6 => conn.execute(&sql, params![state.media_address_v6]),
                Field::MediaPort => conn.execute(&sql, params![state.media_port]),
            }
            .map_err(to_io)?;
            Ok(())
        }

        fn load(&self) -> io::Result<Option<EndpointState>> {
            if !self.path.exists() {
                return Ok(None);
            }
            let conn = Connection::open(&self.path).map_err(to_io)?;
            let row = conn
                .query_row(
                    "SELECT dc_id, test_mode, server_address, server_address_v6,
                            server_port, media_address, media_address_v6, media_port, auth_key
                     FROM endpoint WHERE id = 0",
                    [],
                    |row| {
                        let key_blob: Option<Vec<u8>> = row.get(8)?;
                        Ok(EndpointState {
                            dc_id: row.get(0)?,
                            test_mode: row.get::<_, i32>(1)? != 0,
                            server_address: row.get(2)?,
                            server_address_v6: row.get(3)?,
                            server_port: row.get(4)?,
                            media_address: row.get(5)?,
                            media_address_v6: row.get(6)?,
                            media_port: row.get(7)?,
                            auth_key: key_blob.and_then(|k| {
                                let arr: Option<[u8; 256]> = k.try_into().ok();
                                arr
                            }),
                        })
                    },
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    e => Err(to_io(e)),
                })?;
            Ok(row)
        }

        fn clear(&self) -> io::Result<()> {
            let conn = Connection::open(&self.path).map_err(to_io)?;
            conn.execute("DELETE FROM endpoint", []).map_err(to_io)?;
            Ok(())
        }

        fn name(&self) -> &str {
            "sqlite"
        }
    }
}

// ─── EndpointStore ────────────────────────────────────────────────────────────

/// The live endpoint state plus its persistence boundary.
///
/// All mutation goes through here, so every field write reaches the backend
/// in the order it happened.
pub struct EndpointStore {
    backend: Arc<dyn StateBackend>,
    state: Mutex<EndpointState>,
}

impl EndpointStore {
    /// Load the persisted state, or bootstrap and persist a fresh one.
    pub fn open(
        backend: Arc<dyn StateBackend>,
        bootstrap: impl FnOnce() -> EndpointState,
    ) -> io::Result<Self> {
        let state = match backend.load()? {
            Some(state) => {
                tracing::debug!(backend = backend.name(), dc_id = state.dc_id, "loaded state");
                state
            }
            None => {
                let state = bootstrap();
                backend.persist(&state, Field::DcId)?;
                tracing::debug!(backend = backend.name(), dc_id = state.dc_id, "bootstrapped state");
                state
            }
        };
        Ok(Self { backend, state: Mutex::new(state) })
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> EndpointState {
        self.state.lock().await.clone()
    }

    /// Switch the active data center.
    pub async fn set_dc_id(&self, dc_id: i32) -> io::Result<()> {
        let mut state = self.state.lock().await;
        state.dc_id = dc_id;
        self.backend.persist(&state, Field::DcId)
    }

    /// Store a freshly exchanged authorization key.
    pub async fn set_auth_key(&self, key: [u8; 256]) -> io::Result<()> {
        let mut state = self.state.lock().await;
        state.auth_key = Some(key);
        self.backend.persist(&state, Field::AuthKey)
    }

    /// Reconcile the state against a configuration table and persist every
    /// field the reconciler touched, in write order.
    pub async fn apply_dc_options(
        &self,
        target_dc_id: i32,
        options: &[DcOption],
    ) -> Result<Vec<Field>, InvocationError> {
        let mut state = self.state.lock().await;
        let writes = reconcile::apply_dc_options(&mut state, target_dc_id, options);
        for &field in &writes {
            tracing::debug!(field = field.name(), "persisting endpoint field");
            self.backend.persist(&state, field)?;
        }
        Ok(writes)
    }
}
