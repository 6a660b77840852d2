//! # Ledger (Write-Ahead Journal)
//!
//! **Crash-Safe Record of Committed Mutations**
//!
//! Every reward or craft the store accepts is journaled here before the new
//! player record becomes visible. After a crash the committed entries can be
//! replayed onto the last checkpoint:
//! - Committed transactions: replayed
//! - Torn or uncommitted tails: discarded and truncated away
//!
//! ## Guarantees
//!
//! 1. **Durability**: Once `commit()` returns, the entry is synced to disk
//! 2. **Atomicity**: A transaction's records are written in one locked burst
//! 3. **Integrity**: Every record carries a CRC32, recovery stops at the first bad one
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "VLDG"]
//! [4 bytes: version]
//! [8 bytes: LSN at last checkpoint]
//!
//! Entry format:
//! [8 bytes: LSN (Log Sequence Number)]
//! [1 byte: record type (BEGIN/OP/COMMIT)]
//! [4 bytes: payload length]
//! [N bytes: payload (encoded entry)]
//! [4 bytes: CRC32 of above]
//! ```

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::catalog::{ItemId, RecipeItem};
use crate::error::{EconomyError, EconomyResult};
use crate::store::{CraftDelta, ItemGrant, RewardDelta};

/// Magic bytes identifying a ledger file.
const LEDGER_MAGIC: &[u8; 4] = b"VLDG";

/// Current ledger format version.
const LEDGER_VERSION: u32 = 1;

/// Header length in bytes.
const HEADER_LEN: u64 = 16;

/// Fixed bytes around every record payload.
const RECORD_OVERHEAD: u64 = 8 + 1 + 4 + 4;

/// Ledger record types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    Begin = 1,
    Operation = 2,
    Commit = 3,
}

impl RecordType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Begin),
            2 => Some(Self::Operation),
            3 => Some(Self::Commit),
            _ => None,
        }
    }
}

/// A journaled mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEntry {
    /// Exploration or battle rewards (or a penalty).
    Reward {
        /// Player the delta applies to.
        player_id: u64,
        /// The applied delta.
        delta: RewardDelta,
    },
    /// A completed craft.
    Craft {
        /// Player who crafted.
        player_id: u64,
        /// The applied craft.
        delta: CraftDelta,
    },
}

impl LedgerEntry {
    /// Player the entry belongs to.
    #[must_use]
    pub const fn player_id(&self) -> u64 {
        match self {
            Self::Reward { player_id, .. } | Self::Craft { player_id, .. } => *player_id,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Encoder::default();
        match self {
            Self::Reward { player_id, delta } => {
                buf.u8(1);
                buf.u64(*player_id);
                buf.i64(delta.currency_delta);
                buf.u64(delta.xp_delta);
                buf.u32(delta.level_after.unwrap_or(0));
                buf.u32(delta.items.len() as u32);
                for grant in &delta.items {
                    buf.u32(grant.item_id);
                    buf.u64(grant.quantity);
                }
            }
            Self::Craft { player_id, delta } => {
                buf.u8(2);
                buf.u64(*player_id);
                buf.u32(delta.recipe_id);
                buf.u32(delta.required_level);
                buf.u64(delta.currency_cost);
                buf.u32(delta.ingredients.len() as u32);
                for ingredient in &delta.ingredients {
                    buf.u32(ingredient.item_id);
                    buf.u32(ingredient.quantity);
                }
                buf.u32(delta.output.item_id);
                buf.u32(delta.output.quantity);
            }
        }
        buf.0
    }

    fn decode(data: &[u8]) -> Option<Self> {
        let mut d = Decoder { data, pos: 0 };
        let entry = match d.u8()? {
            1 => {
                let player_id = d.u64()?;
                let currency_delta = d.i64()?;
                let xp_delta = d.u64()?;
                let level_after = Some(d.u32()?).filter(|&level| level > 0);
                let count = d.u32()?;
                let mut items = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    let item_id: ItemId = d.u32()?;
                    items.push(ItemGrant::new(item_id, d.u64()?));
                }
                Self::Reward {
                    player_id,
                    delta: RewardDelta {
                        currency_delta,
                        xp_delta,
                        level_after,
                        items,
                    },
                }
            }
            2 => {
                let player_id = d.u64()?;
                let recipe_id = d.u32()?;
                let required_level = d.u32()?;
                let currency_cost = d.u64()?;
                let count = d.u32()?;
                let mut ingredients = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    ingredients.push(RecipeItem::new(d.u32()?, d.u32()?));
                }
                let output = RecipeItem::new(d.u32()?, d.u32()?);
                Self::Craft {
                    player_id,
                    delta: CraftDelta {
                        recipe_id,
                        required_level,
                        currency_cost,
                        ingredients,
                        output,
                    },
                }
            }
            _ => return None,
        };
        d.finished().then_some(entry)
    }
}

#[derive(Default)]
struct Encoder(Vec<u8>);

impl Encoder {
    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }
    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }
    fn u64(&mut self, v: u64) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }
    fn i64(&mut self, v: i64) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Decoder<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }
    fn u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|b| b[0])
    }
    fn u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }
    fn u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }
    fn i64(&mut self) -> Option<i64> {
        self.take().map(i64::from_le_bytes)
    }
    fn finished(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Groups entries that must land together.
///
/// Nothing reaches the file until [`LedgerTransaction::commit`]; dropping an
/// uncommitted transaction discards its entries.
pub struct LedgerTransaction<'a> {
    ledger: &'a Ledger,
    entries: Vec<LedgerEntry>,
    finalized: bool,
}

impl LedgerTransaction<'_> {
    /// Adds an entry to the transaction.
    pub fn add(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// Writes and syncs the transaction. Returns the LSN of its COMMIT record.
    ///
    /// # Errors
    ///
    /// Returns `Ledger` if the write or sync fails.
    pub fn commit(mut self) -> EconomyResult<u64> {
        self.finalized = true;
        let entries = std::mem::take(&mut self.entries);
        self.ledger.write_transaction(&entries)
    }

    /// Discards the transaction.
    pub fn rollback(mut self) {
        self.finalized = true;
        self.entries.clear();
    }
}

impl Drop for LedgerTransaction<'_> {
    fn drop(&mut self) {
        if !self.finalized && !self.entries.is_empty() {
            tracing::debug!(
                "Ledger transaction dropped without commit, {} entries discarded",
                self.entries.len()
            );
        }
    }
}

/// Write-ahead journal for committed store mutations.
pub struct Ledger {
    path: PathBuf,
    next_lsn: AtomicU64,
    file: Mutex<BufWriter<File>>,
    recovered: Vec<LedgerEntry>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("path", &self.path)
            .field("next_lsn", &self.next_lsn.load(Ordering::SeqCst))
            .field("recovered", &self.recovered.len())
            .finish_non_exhaustive()
    }
}

fn io_err(context: &str) -> impl FnOnce(std::io::Error) -> EconomyError + '_ {
    move |e| EconomyError::Ledger(format!("{context}: {e}"))
}

impl Ledger {
    /// Opens or creates a ledger file.
    ///
    /// An existing file is recovered: committed entries become available via
    /// [`Ledger::recovered_entries`] and any torn tail is truncated.
    ///
    /// # Errors
    ///
    /// Returns `Ledger` on I/O failure or a foreign/unsupported header.
    pub fn open(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err("failed to open ledger"))?;

        let length = file.metadata().map_err(io_err("failed to stat ledger"))?.len();
        if length == 0 {
            file.write_all(LEDGER_MAGIC).map_err(io_err("failed to write header"))?;
            file.write_all(&LEDGER_VERSION.to_le_bytes())
                .map_err(io_err("failed to write header"))?;
            file.write_all(&0u64.to_le_bytes()).map_err(io_err("failed to write header"))?;
            file.sync_all().map_err(io_err("failed to sync header"))?;
        }

        let recovery = Self::recover(&path)?;

        file.set_len(recovery.valid_len).map_err(io_err("failed to truncate torn tail"))?;
        file.seek(SeekFrom::Start(recovery.valid_len))
            .map_err(io_err("failed to seek ledger"))?;

        if recovery.discarded > 0 {
            tracing::warn!(
                "Ledger recovery: {} uncommitted records discarded from {}",
                recovery.discarded,
                path.display()
            );
        }
        tracing::info!(
            "Ledger opened at {}: {} committed entries recovered",
            path.display(),
            recovery.entries.len()
        );

        Ok(Self {
            path,
            next_lsn: AtomicU64::new(recovery.next_lsn),
            file: Mutex::new(BufWriter::new(file)),
            recovered: recovery.entries,
        })
    }

    /// Entries committed before this ledger was opened, in commit order.
    #[must_use]
    pub fn recovered_entries(&self) -> &[LedgerEntry] {
        &self.recovered
    }

    /// Path of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begins a new transaction.
    #[must_use]
    pub fn begin(&self) -> LedgerTransaction<'_> {
        LedgerTransaction {
            ledger: self,
            entries: Vec::new(),
            finalized: false,
        }
    }

    /// Journals a single entry as its own transaction.
    ///
    /// # Errors
    ///
    /// Returns `Ledger` if the write or sync fails.
    pub fn append(&self, entry: LedgerEntry) -> EconomyResult<u64> {
        let mut txn = self.begin();
        txn.add(entry);
        txn.commit()
    }

    fn write_transaction(&self, entries: &[LedgerEntry]) -> EconomyResult<u64> {
        let mut file = self.file.lock();
        let begin = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        Self::write_record(&mut file, begin, RecordType::Begin, &[])?;
        for entry in entries {
            let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
            Self::write_record(&mut file, lsn, RecordType::Operation, &entry.encode())?;
        }
        let commit = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        Self::write_record(&mut file, commit, RecordType::Commit, &[])?;

        file.flush().map_err(io_err("ledger flush failed"))?;
        file.get_ref().sync_data().map_err(io_err("ledger sync failed"))?;
        Ok(commit)
    }

    fn write_record(
        file: &mut BufWriter<File>,
        lsn: u64,
        record_type: RecordType,
        payload: &[u8],
    ) -> EconomyResult<()> {
        let mut record = Vec::with_capacity(RECORD_OVERHEAD as usize + payload.len());
        record.extend_from_slice(&lsn.to_le_bytes());
        record.push(record_type as u8);
        record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        record.extend_from_slice(payload);
        let crc = crc32fast::hash(&record);
        record.extend_from_slice(&crc.to_le_bytes());

        file.write_all(&record).map_err(io_err("ledger write failed"))
    }

    fn recover(path: &Path) -> EconomyResult<Recovery> {
        let file = File::open(path).map_err(io_err("failed to open ledger for recovery"))?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_LEN as usize];
        reader.read_exact(&mut header).map_err(io_err("failed to read ledger header"))?;
        if &header[0..4] != LEDGER_MAGIC {
            return Err(EconomyError::Ledger("invalid ledger magic".to_string()));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != LEDGER_VERSION {
            return Err(EconomyError::Ledger(format!("unsupported ledger version: {version}")));
        }
        let mut checkpoint_lsn = [0u8; 8];
        checkpoint_lsn.copy_from_slice(&header[8..16]);

        let mut recovery = Recovery {
            entries: Vec::new(),
            valid_len: HEADER_LEN,
            next_lsn: u64::from_le_bytes(checkpoint_lsn),
            discarded: 0,
        };
        let mut position = HEADER_LEN;
        let mut open: Option<Vec<LedgerEntry>> = None;
        let mut open_records = 0;

        while let Some((lsn, record_type, payload)) = Self::read_record(&mut reader) {
            position += RECORD_OVERHEAD + payload.len() as u64;
            match record_type {
                RecordType::Begin => {
                    recovery.discarded += open_records;
                    open = Some(Vec::new());
                    open_records = 1;
                }
                RecordType::Operation => {
                    let (Some(entries), Some(entry)) = (open.as_mut(), LedgerEntry::decode(&payload))
                    else {
                        break;
                    };
                    entries.push(entry);
                    open_records += 1;
                }
                RecordType::Commit => {
                    let Some(entries) = open.take() else {
                        break;
                    };
                    recovery.entries.extend(entries);
                    recovery.valid_len = position;
                    recovery.next_lsn = lsn + 1;
                    open_records = 0;
                }
            }
        }

        recovery.discarded += open_records;
        Ok(recovery)
    }

    /// Reads one record, `None` at end of file or on corruption.
    fn read_record(reader: &mut BufReader<File>) -> Option<(u64, RecordType, Vec<u8>)> {
        let mut head = [0u8; 13];
        reader.read_exact(&mut head).ok()?;
        let lsn = u64::from_le_bytes(head[0..8].try_into().ok()?);
        let record_type = RecordType::from_u8(head[8])?;
        let payload_len = u32::from_le_bytes(head[9..13].try_into().ok()?) as usize;

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload).ok()?;

        let mut crc_bytes = [0u8; 4];
        reader.read_exact(&mut crc_bytes).ok()?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&head);
        hasher.update(&payload);
        if hasher.finalize() != u32::from_le_bytes(crc_bytes) {
            return None;
        }

        Some((lsn, record_type, payload))
    }

    /// Truncates the ledger after its state has been persisted elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `Ledger` on I/O failure.
    pub fn checkpoint(&self) -> EconomyResult<()> {
        let mut file = self.file.lock();
        file.flush().map_err(io_err("ledger flush failed"))?;

        let inner = file.get_mut();
        inner.seek(SeekFrom::Start(8)).map_err(io_err("ledger seek failed"))?;
        inner
            .write_all(&self.next_lsn.load(Ordering::SeqCst).to_le_bytes())
            .map_err(io_err("ledger write failed"))?;
        inner.set_len(HEADER_LEN).map_err(io_err("ledger truncate failed"))?;
        inner.seek(SeekFrom::Start(HEADER_LEN)).map_err(io_err("ledger seek failed"))?;
        inner.sync_all().map_err(io_err("ledger sync failed"))?;

        tracing::info!("Ledger checkpoint at {}", self.path.display());
        Ok(())
    }
}

struct Recovery {
    entries: Vec<LedgerEntry>,
    valid_len: u64,
    next_lsn: u64,
    discarded: u64,
}
