//! Process-wide lazy broker wrapper (DESIGN NOTES §9 "Global singleton
//! broker").
//!
//! The Go source exposes a package-level `Rmq` initialized via
//! `sync.Once`: every caller in the process reaches the same broker
//! through a bare global. That couples the library to a single,
//! hard-coded data directory and makes it impossible to run two
//! brokers (e.g. in tests) in the same process.
//!
//! `LazyBroker` keeps the "open once, share everywhere" ergonomics
//! without the library owning global state: it is a plain value the
//! *caller* constructs and, if a process-wide handle is actually
//! wanted, places into a `static` of their own. The open itself is
//! deferred to first use and memoized, mirroring the teacher's
//! `EmbedModelState::get_or_load` (`crates/intelligence/src/embed/
//! mod.rs`) — a `once_cell::sync::OnceCell` caching a `Result` so a
//! failed open is never silently retried into a half-initialized state.

use std::path::PathBuf;

use once_cell::sync::OnceCell;

use rmq_core::{Config, Error, Result};
use rmq_engine::Broker;

/// Deferred, memoized [`Broker::open`].
///
/// ```
/// use rocksmq::{Config, LazyBroker};
///
/// let lazy = LazyBroker::new("./data", Config::for_testing());
/// // Nothing is opened yet. First call to `get` opens it...
/// let broker = lazy.get().unwrap();
/// // ...every subsequent call returns the same broker.
/// assert!(std::ptr::eq(lazy.get().unwrap(), broker));
/// # std::fs::remove_dir_all("./data").ok();
/// ```
///
/// A process-wide singleton, if genuinely wanted, is the caller's
/// choice to make explicit:
///
/// ```
/// use once_cell::sync::Lazy;
/// use rocksmq::{Config, LazyBroker};
///
/// static BROKER: Lazy<LazyBroker> =
///     Lazy::new(|| LazyBroker::new("./data2", Config::for_testing()));
///
/// let broker = BROKER.get().unwrap();
/// # std::fs::remove_dir_all("./data2").ok();
/// ```
pub struct LazyBroker {
    path: PathBuf,
    config: Config,
    cell: OnceCell<std::result::Result<Broker, String>>,
}

impl LazyBroker {
    /// Describe a broker to open on first use. Opens nothing yet.
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config,
            cell: OnceCell::new(),
        }
    }

    /// Open the broker on first call; every later call returns the same
    /// instance. A failed open is cached as an error and never retried
    /// (matches `EmbedModelState`'s "stores the error and never retries"
    /// contract) — a directory that is unreadable once is assumed to
    /// stay unreadable for the life of this `LazyBroker`.
    pub fn get(&self) -> Result<&Broker> {
        let slot = self
            .cell
            .get_or_init(|| Broker::open(&self.path, self.config.clone()).map_err(|e| e.to_string()));
        slot.as_ref().map_err(|msg| Error::StorageError(msg.clone()))
    }

    /// Whether the broker has been opened yet.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}
