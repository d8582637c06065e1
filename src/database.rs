//! In-memory database facade over the commit arbitrator

use std::path::Path;
use std::sync::Arc;

use strata_concurrency::{
    ArbitratorConfig, ArbitratorStats, CommitArbitrator, CommitOutcome, Session,
};
use strata_core::{RecordKey, Value, Version, VersionedStore};
use strata_storage::ShardedStore;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::retry::RetryConfig;

/// Shared record table plus the arbitrator that guards it
///
/// `Database` is `Send + Sync`; share it across threads with `Arc`.
///
/// # Example
///
/// ```
/// use strata_occ::{Database, RecordKey, Value};
///
/// let db = Database::ephemeral();
/// let key = RecordKey::new("Account", "42");
/// db.seed(key.clone(), Value::Int(100));
///
/// db.session(|s, db| {
///     let balance = db.load(s, &key)?.and_then(|v| v.as_int()).unwrap_or(0);
///     s.update(key.clone(), Value::Int(balance + 50))?;
///     Ok(())
/// })?;
///
/// assert_eq!(db.get(&key)?, Some(Value::Int(150)));
/// # Ok::<(), strata_occ::Error>(())
/// ```
#[derive(Debug)]
pub struct Database {
    arbitrator: CommitArbitrator<ShardedStore>,
}

impl Database {
    /// Empty database with the default configuration
    pub fn ephemeral() -> Self {
        Database {
            arbitrator: CommitArbitrator::with_defaults(Arc::new(ShardedStore::new())),
        }
    }

    /// Empty database with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn with_config(config: ArbitratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Database {
            arbitrator: CommitArbitrator::new(Arc::new(ShardedStore::new()), config),
        })
    }

    /// Empty database configured from a `strata-occ.toml` file
    ///
    /// A default config file is written first if none exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be written, read or parsed.
    pub fn open_with_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ArbitratorConfig::write_default_if_missing(path)?;
        let config = ArbitratorConfig::from_file(path)?;
        info!(
            target: "strata::occ",
            path = %path.display(),
            reporting = ?config.conflict_reporting,
            "Loaded arbitrator config"
        );
        Self::with_config(config)
    }

    /// Active configuration
    pub fn config(&self) -> &ArbitratorConfig {
        self.arbitrator.config()
    }

    /// The underlying arbitrator
    pub fn arbitrator(&self) -> &CommitArbitrator<ShardedStore> {
        &self.arbitrator
    }

    /// The shared record table
    pub fn store(&self) -> &ShardedStore {
        self.arbitrator.store()
    }

    /// Write a record outside any session, bumping its version
    ///
    /// Meant for fixtures and bulk loading. A session that observed the
    /// record before will conflict on commit.
    pub fn seed(&self, key: RecordKey, value: Value) -> Version {
        self.store().put(key, value)
    }

    /// Current committed value, `None` if absent or deleted
    pub fn get(&self, key: &RecordKey) -> Result<Option<Value>> {
        Ok(self.store().get(key)?.map(|v| v.value))
    }

    /// Current committed version (`Version::ZERO` if never written)
    pub fn version(&self, key: &RecordKey) -> Result<Version> {
        Ok(self.store().current_version(key)?)
    }

    /// Begin a session for manual control
    ///
    /// Prefer [`session`](Self::session), which commits or rolls back for you.
    pub fn begin_session(&self) -> Session {
        self.arbitrator.begin()
    }

    /// Load a record into a session
    pub fn load(&self, session: &mut Session, key: &RecordKey) -> Result<Option<Value>> {
        Ok(self.arbitrator.load(session, key)?)
    }

    /// Commit a session
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` if any written record moved since the
    /// session observed it. Nothing the session wrote is visible then.
    pub fn commit(&self, session: &mut Session) -> Result<CommitOutcome> {
        Ok(self.arbitrator.try_commit(session)?)
    }

    /// Roll back a session, discarding its writes
    pub fn rollback(&self, session: &mut Session) -> Result<()> {
        Ok(self.arbitrator.rollback(session, "rolled back by caller")?)
    }

    /// Run `f` in a fresh session, committing on `Ok` and rolling back on `Err`
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or the commit's error.
    pub fn session<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session, &Self) -> Result<T>,
    {
        let mut session = self.begin_session();
        self.run_single_attempt(&mut session, f)
    }

    /// Like [`session`](Self::session), rerunning `f` on conflict
    ///
    /// Each attempt starts a new session, so `f` reloads whatever it reads
    /// and sees the winner's writes. Non-conflict errors are not retried.
    ///
    /// # Errors
    ///
    /// Returns the last conflict once `config.max_retries` retries are used
    /// up, or the first non-conflict error.
    pub fn session_with_retry<F, T>(&self, config: RetryConfig, f: F) -> Result<T>
    where
        F: Fn(&mut Session, &Self) -> Result<T>,
    {
        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            let mut session = self.begin_session();
            match self.run_single_attempt(&mut session, &f) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    debug!(
                        target: "strata::occ",
                        session = %session.id(),
                        attempt,
                        "Retrying session after conflict"
                    );
                    last_error = Some(e);
                    std::thread::sleep(config.calculate_delay(attempt));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Internal("retry loop exited without a result".into())))
    }

    fn run_single_attempt<F, T>(&self, session: &mut Session, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session, &Self) -> Result<T>,
    {
        match f(session, self) {
            Ok(value) => {
                self.commit(session)?;
                Ok(value)
            }
            Err(e) => {
                if session.is_active() {
                    self.arbitrator
                        .rollback(session, format!("closure error: {}", e))?;
                }
                Err(e)
            }
        }
    }

    /// Arbitrator counters
    pub fn stats(&self) -> ArbitratorStats {
        self.arbitrator.stats()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::ephemeral()
    }
}
