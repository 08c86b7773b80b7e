//! Persisted host state
//!
//! Manages the `.steadystate/state.json` file which tracks the identity
//! token and last committed attributes of every managed instance.

use crate::error::{CoreError, Result};
use crate::host::ResourceData;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
pub const STATE_DIR: &str = ".steadystate";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_STAGING: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// All instances tracked by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Instances indexed by host-side name
    pub instances: BTreeMap<String, InstanceRecord>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            instances: BTreeMap::new(),
        }
    }
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&InstanceRecord> {
        self.instances.get(name)
    }

    /// Store the committed view of `data`. An instance without an identity
    /// token is removed instead.
    pub fn record(&mut self, name: &str, data: &ResourceData) {
        match data.id() {
            Some(id) => {
                let now = Utc::now();
                let created_at = self
                    .instances
                    .get(name)
                    .map(|r| r.created_at)
                    .unwrap_or(now);
                self.instances.insert(
                    name.to_string(),
                    InstanceRecord {
                        resource_type: data.resource_type().to_string(),
                        id: id.to_string(),
                        attributes: data.attributes().clone(),
                        created_at,
                        updated_at: now,
                    },
                );
            }
            None => {
                self.instances.remove(name);
            }
        }
        self.updated_at = Utc::now();
    }

    pub fn remove(&mut self, name: &str) -> Option<InstanceRecord> {
        let result = self.instances.remove(name);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<(&String, &InstanceRecord)> {
        self.instances
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .collect()
    }
}

/// One tracked instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub resource_type: String,

    /// Identity token
    pub id: String,

    /// Attributes as of the last committed invocation
    pub attributes: Map<String, Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl InstanceRecord {
    /// Host record to hand to a lifecycle invocation
    pub fn to_data(&self) -> ResourceData {
        ResourceData::from_state(&self.resource_type, &self.id, self.attributes.clone())
    }
}

const STALE_LOCK_HOURS: i64 = 1;
const LOCK_ATTEMPTS: usize = 3;

/// Reads and writes `.steadystate/state.json` and guards it with a lock file
pub struct StateManager {
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    pub async fn load(&self) -> Result<HostState> {
        let path = self.state_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No state at {}, starting empty", path.display());
                return Ok(HostState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: HostState = serde_json::from_str(&content)?;
        if state.version > STATE_VERSION {
            return Err(CoreError::State(format!(
                "state file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} instances", state.instances.len());
        Ok(state)
    }

    /// Replace the state file. The new content is written to a sibling temp
    /// file and renamed into place; the previous file is kept as a backup.
    pub async fn save(&self, state: &HostState) -> Result<()> {
        fs::create_dir_all(self.state_dir()).await?;

        let path = self.state_path();
        let staging = self.state_dir().join(STATE_STAGING);
        write_synced(&staging, serde_json::to_string_pretty(state)?.as_bytes()).await?;

        match fs::copy(&path, self.state_dir().join(STATE_BACKUP)).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::rename(&staging, &path).await?;

        tracing::debug!("Saved state with {} instances", state.instances.len());
        Ok(())
    }

    /// Take the state lock.
    ///
    /// The lock file is created with `create_new`, so of two concurrent
    /// callers exactly one wins. A lock older than an hour is taken to be
    /// left behind by a crashed process and is broken.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(self.state_dir()).await?;
        let lock_path = self.lock_path();

        for _ in 0..LOCK_ATTEMPTS {
            let info = LockInfo::current();
            match create_lock_file(&lock_path, &info).await {
                Ok(()) => {
                    tracing::debug!("Acquired state lock as {}", info.holder);
                    return Ok(StateLock {
                        lock_path,
                        info,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            // Released between our attempt and this read
            let Some((holder, since)) = held_lock(&lock_path).await? else {
                continue;
            };
            if Utc::now() - since < TimeDelta::hours(STALE_LOCK_HOURS) {
                return Err(CoreError::Lock(format!(
                    "state is locked by {} since {}",
                    holder, since
                )));
            }

            tracing::warn!("Breaking stale state lock held by {} since {}", holder, since);
            match fs::remove_file(&lock_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::Lock(
            "state lock kept changing hands, try again".to_string(),
        ))
    }
}

/// Holder and start time of an existing lock; `None` if it is gone
async fn held_lock(path: &Path) -> Result<Option<(String, DateTime<Utc>)>> {
    if let Some(info) = LockInfo::read(path).await? {
        return Ok(Some((info.holder, info.acquired_at)));
    }

    // Created but not yet written, or cut short by a crash
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some((
            "an unknown process".to_string(),
            DateTime::<Utc>::from(meta.modified()?),
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}

async fn create_lock_file(path: &Path, info: &LockInfo) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    let content = serde_json::to_vec_pretty(info).map_err(std::io::Error::other)?;
    file.write_all(&content).await?;
    file.sync_all().await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        let host = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| "unknown".to_string());
        let pid = std::process::id();
        Self {
            holder: format!("{}:{}", host, pid),
            pid,
            acquired_at: Utc::now(),
        }
    }

    /// `None` when the file is gone or not a complete lock record
    async fn read(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::from_str(&content).ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Held state lock; released on drop
pub struct StateLock {
    lock_path: PathBuf,
    info: LockInfo,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        // Someone broke our lock as stale and holds it now
        if LockInfo::read(&self.lock_path).await?.as_ref() != Some(&self.info) {
            tracing::warn!("State lock was taken over before release");
            return Ok(());
        }
        fs::remove_file(&self.lock_path).await?;
        tracing::debug!("Released state lock");
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let ours = std::fs::read_to_string(&self.lock_path)
            .ok()
            .and_then(|c| serde_json::from_str::<LockInfo>(&c).ok())
            .is_some_and(|held| held == self.info);
        if ours {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
