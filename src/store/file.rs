//! JSON file store
//!
//! Each collection lives in its own generation-numbered file under the state
//! directory, e.g. `orders.7.json`. `manifest.json` names the current file of
//! every collection and holds the order id counter. A write stores only the
//! collections it touched, then swaps the manifest in with one rename; that
//! rename is the commit point, so a failed write leaves the previous
//! generation in force.

use crate::error::{Result, SimError};
use crate::finance::{AccountLedger, RealizedTrade};
use crate::order::Order;
use crate::store::{LedgerStore, StoreState, TradeCommit};
use crate::types::{AccountId, OrderId};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const MANIFEST_FILE: &str = "manifest.json";

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Ledgers,
    Orders,
    Realized,
}

impl Collection {
    const ALL: [Collection; 3] = [Collection::Ledgers, Collection::Orders, Collection::Realized];

    fn name(self) -> &'static str {
        match self {
            Collection::Ledgers => "ledgers",
            Collection::Orders => "orders",
            Collection::Realized => "realized",
        }
    }

    fn encode(self, state: &StoreState) -> Result<Vec<u8>> {
        let bytes = match self {
            Collection::Ledgers => serde_json::to_vec_pretty(&state.ledgers)?,
            Collection::Orders => serde_json::to_vec_pretty(&state.orders)?,
            Collection::Realized => serde_json::to_vec_pretty(&state.realized)?,
        };
        Ok(bytes)
    }
}

/// Current file of each collection plus the order counter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Manifest {
    generation: u64,
    next_order_id: OrderId,
    #[serde(default)]
    ledgers: Option<String>,
    #[serde(default)]
    orders: Option<String>,
    #[serde(default)]
    realized: Option<String>,
}

impl Manifest {
    fn file(&self, collection: Collection) -> Option<&str> {
        match collection {
            Collection::Ledgers => self.ledgers.as_deref(),
            Collection::Orders => self.orders.as_deref(),
            Collection::Realized => self.realized.as_deref(),
        }
    }

    fn set_file(&mut self, collection: Collection, file: String) {
        let slot = match collection {
            Collection::Ledgers => &mut self.ledgers,
            Collection::Orders => &mut self.orders,
            Collection::Realized => &mut self.realized,
        };
        *slot = Some(file);
    }
}

#[derive(Debug)]
struct Inner {
    state: StoreState,
    manifest: Manifest,
}

/// Store persisting every collection as JSON under a directory
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonFileStore {
    /// Open (or create) a store in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let manifest: Manifest = read_json(&dir.join(MANIFEST_FILE))?.unwrap_or_default();
        let mut state = StoreState {
            ledgers: read_collection(&dir, manifest.ledgers.as_deref())?,
            orders: read_collection(&dir, manifest.orders.as_deref())?,
            realized: read_collection(&dir, manifest.realized.as_deref())?,
            ..StoreState::default()
        };
        state.next_order_id = manifest.next_order_id.max(state.min_next_order_id());

        log::info!(
            "Opened state store at {} (generation {}, {} accounts, {} orders)",
            dir.display(),
            manifest.generation,
            state.ledgers.len(),
            state.order_count()
        );

        Ok(Self {
            dir,
            inner: Mutex::new(Inner { state, manifest }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the `changed` collections of `next` to disk, then install it
    /// as the current state
    fn replace(&self, inner: &mut Inner, next: StoreState, changed: &[Collection]) -> Result<()> {
        let manifest = self.persist(&inner.manifest, &next, changed)?;
        inner.state = next;
        inner.manifest = manifest;
        Ok(())
    }

    fn persist(&self, current: &Manifest, state: &StoreState, changed: &[Collection]) -> Result<Manifest> {
        let mut retries = 0;
        loop {
            match self.write_generation(current, state, changed) {
                Ok(manifest) => return Ok(manifest),
                Err(e) if retries < MAX_RETRIES => {
                    retries += 1;
                    log::warn!("State write failed ({}); retry {}/{}", e, retries, MAX_RETRIES);
                    thread::sleep(Duration::from_millis(RETRY_DELAY_MS * retries as u64));
                }
                Err(e) => {
                    return Err(SimError::Persistence(format!(
                        "writing state to {}: {}",
                        self.dir.display(),
                        e
                    )))
                }
            }
        }
    }

    fn write_generation(&self, current: &Manifest, state: &StoreState, changed: &[Collection]) -> Result<Manifest> {
        let mut next = current.clone();
        next.generation += 1;
        next.next_order_id = state.next_order_id;

        for &collection in changed {
            let file = format!("{}.{}.json", collection.name(), next.generation);
            write_synced(&self.dir.join(&file), &collection.encode(state)?)?;
            next.set_file(collection, file);
        }

        let tmp = self.dir.join(format!("{}.tmp", MANIFEST_FILE));
        write_synced(&tmp, &serde_json::to_vec_pretty(&next)?)?;
        fs::rename(&tmp, self.dir.join(MANIFEST_FILE))?;

        for &collection in changed {
            if let Some(old) = current.file(collection) {
                if let Err(e) = fs::remove_file(self.dir.join(old)) {
                    log::debug!("Could not remove superseded {}: {}", old, e);
                }
            }
        }
        Ok(next)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| SimError::Persistence(format!("corrupt {}: {}", path.display(), e)))
}

fn read_collection<T: DeserializeOwned + Default>(dir: &Path, file: Option<&str>) -> Result<T> {
    let Some(file) = file else {
        return Ok(T::default());
    };
    let path = dir.join(file);
    read_json(&path)?.ok_or_else(|| SimError::Persistence(format!("missing {}", path.display())))
}

impl LedgerStore for JsonFileStore {
    fn load_ledger(&self, account: &str) -> Result<Option<AccountLedger>> {
        Ok(self.inner.lock().state.ledgers.get(account).cloned())
    }

    fn load_orders(&self, account: &str) -> Result<Vec<Order>> {
        Ok(self.inner.lock().state.orders_of(account))
    }

    fn load_realized(&self, account: &str) -> Result<Vec<RealizedTrade>> {
        Ok(self.inner.lock().state.realized_of(account))
    }

    fn accounts(&self) -> Result<Vec<AccountId>> {
        Ok(self.inner.lock().state.ledgers.keys().cloned().collect())
    }

    fn save_ledger(&self, ledger: &AccountLedger) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut next = inner.state.clone();
        next.ledgers.insert(ledger.account_id.clone(), ledger.clone());
        self.replace(&mut inner, next, &[Collection::Ledgers])
    }

    fn commit(&self, build: &dyn Fn(OrderId) -> TradeCommit) -> Result<Order> {
        let mut inner = self.inner.lock();
        let mut next = inner.state.clone();
        let commit = build(next.next_order_id);
        let changed: &[Collection] = if commit.realized.is_some() {
            &Collection::ALL
        } else {
            &[Collection::Ledgers, Collection::Orders]
        };
        let order = commit.order.clone();
        next.apply(commit);
        self.replace(&mut inner, next, changed)?;
        Ok(order)
    }

    fn export(&self) -> Result<StoreState> {
        Ok(self.inner.lock().state.clone())
    }

    fn import(&self, imported: StoreState) -> Result<()> {
        let mut inner = self.inner.lock();
        self.replace(&mut inner, imported, &Collection::ALL)
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.replace(&mut inner, StoreState::default(), &Collection::ALL)?;
        log::info!("Cleared state store at {}", self.dir.display());
        Ok(())
    }
}
