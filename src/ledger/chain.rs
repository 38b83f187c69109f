//! Ledger
//!
//! Append-only chain of mined blocks plus a staging buffer of entries that
//! have not been sealed yet. All mutation goes through one write lock, so
//! readers always see a chain either before or after a whole append.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{LedgerError, Result};
use crate::ledger::block::{Block, BlockData};
use crate::ledger::entry::LogEntry;
use crate::ledger::store::ChainStore;
use crate::ledger::verify::{find_tampered_blocks, validate_chain, IntegrityViolation};

/// Entries sealed per block
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Leading zero hex digits required of a block hash
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Batching and mining policy
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub difficulty: usize,
    pub batch_size: usize,
    /// Upper bound on nonce attempts per block; `None` searches until found
    pub max_mining_attempts: Option<u64>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            batch_size: DEFAULT_BATCH_SIZE,
            max_mining_attempts: None,
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<LogEntry>,
    /// Ids of every staged or committed entry
    known_ids: HashSet<String>,
}

impl LedgerState {
    fn last_block(&self) -> Result<&Block> {
        self.chain
            .last()
            .ok_or_else(|| LedgerError::Internal("Ledger has not been initialized".to_string()))
    }
}

/// Single-writer, hash-chained log ledger
pub struct Ledger {
    store: Arc<dyn ChainStore>,
    settings: LedgerSettings,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Create an uninitialized ledger; call `initialize` before use
    pub fn new(store: Arc<dyn ChainStore>, settings: LedgerSettings) -> Self {
        Self {
            store,
            settings,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Create and initialize in one step
    pub async fn open(store: Arc<dyn ChainStore>, settings: LedgerSettings) -> Result<Self> {
        let ledger = Self::new(store, settings);
        ledger.initialize().await?;
        Ok(ledger)
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Load the persisted chain, or mine and persist a genesis block when
    /// none exists. A persisted chain that fails validation is rejected.
    pub async fn initialize(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.chain.is_empty() {
            debug!("Ledger already initialized with {} blocks", state.chain.len());
            return Ok(());
        }

        match self.store.load().await {
            Ok(chain) => {
                if let Some(violation) = validate_chain(&chain, self.settings.difficulty) {
                    warn!("Refusing to load persisted chain: {}", violation);
                    return Err(LedgerError::IntegrityViolation(violation));
                }

                state.known_ids = chain
                    .iter()
                    .flat_map(|block| block.entries().iter().map(|entry| entry.id.clone()))
                    .collect();
                state.chain = chain;
                info!("Ledger loaded with {} blocks", state.chain.len());
            }
            Err(LedgerError::NotFound) => {
                info!("No persisted chain found, mining genesis block");
                let genesis = self.mine(Block::genesis()).await?;
                self.store.save(std::slice::from_ref(&genesis)).await?;
                state.chain = vec![genesis];
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }

    /// Stage an entry, committing a block once the batch is full.
    ///
    /// If the triggered commit fails, or the caller is dropped while it
    /// runs, the entry stays staged and the next commit will include it.
    pub async fn add_entry(&self, entry: LogEntry) -> Result<Option<Block>> {
        entry.validate()?;

        let mut state = self.state.write().await;
        state.last_block()?;

        if state.known_ids.contains(&entry.id) {
            return Err(LedgerError::invalid_entry(format!(
                "Log entry {} has already been submitted",
                entry.id
            )));
        }

        state.known_ids.insert(entry.id.clone());
        debug!("Staged log entry {}", entry.id);
        state.pending.push(entry);

        if state.pending.len() >= self.settings.batch_size {
            return self.commit_locked(&mut state).await;
        }
        Ok(None)
    }

    /// Seal all staged entries into a new block. Returns `None` when
    /// nothing is staged.
    pub async fn commit_batch(&self) -> Result<Option<Block>> {
        let mut state = self.state.write().await;
        self.commit_locked(&mut state).await
    }

    /// Commit whatever is staged, however short the batch
    pub async fn flush(&self) -> Result<Option<Block>> {
        let block = self.commit_batch().await?;
        if let Some(block) = &block {
            info!("Flushed {} pending entries into block {}", block.entries().len(), block.index);
        }
        Ok(block)
    }

    async fn commit_locked(&self, state: &mut LedgerState) -> Result<Option<Block>> {
        if state.pending.is_empty() {
            return Ok(None);
        }

        let last = state.last_block()?;
        let candidate = Block::new(
            last.index + 1,
            BlockData::Entries(state.pending.clone()),
            last.hash.clone(),
        );
        let block = self.mine(candidate).await?;

        // Persist first; the caller may be dropped at any await, so state
        // is only touched once the save has returned
        let mut next = Vec::with_capacity(state.chain.len() + 1);
        next.extend_from_slice(&state.chain);
        next.push(block.clone());
        if let Err(e) = self.store.save(&next).await {
            error!("Failed to persist block {}: {}", block.index, e);
            return Err(e);
        }

        state.chain = next;
        state.pending.clear();
        info!("Committed {}", block.summary());
        Ok(Some(block))
    }

    async fn mine(&self, mut block: Block) -> Result<Block> {
        let difficulty = self.settings.difficulty;
        let max_attempts = self.settings.max_mining_attempts;

        tokio::task::spawn_blocking(move || -> Result<Block> {
            block.mine(difficulty, max_attempts)?;
            Ok(block)
        })
        .await
        .map_err(|e| LedgerError::Internal(format!("Mining task failed: {}", e)))?
    }

    /// Run `f` against one consistent snapshot of the chain and staging buffer
    pub async fn read<R>(&self, f: impl FnOnce(&[Block], &[LogEntry]) -> R) -> R {
        let state = self.state.read().await;
        f(&state.chain, &state.pending)
    }

    pub async fn is_valid(&self) -> bool {
        self.validate().await.is_none()
    }

    /// First integrity violation in the current chain, if any
    pub async fn validate(&self) -> Option<IntegrityViolation> {
        self.read(|chain, _| validate_chain(chain, self.settings.difficulty))
            .await
    }

    /// Indexes of blocks whose contents no longer match their hash
    pub async fn find_tampered_blocks(&self) -> Vec<u64> {
        self.read(|chain, _| find_tampered_blocks(chain)).await
    }

    /// First block sealing an entry with the given id
    pub async fn find_block_containing(&self, entry_id: &str) -> Option<Block> {
        self.read(|chain, _| chain.iter().find(|block| block.contains_entry(entry_id)).cloned())
            .await
    }

    pub async fn chain(&self) -> Vec<Block> {
        self.read(|chain, _| chain.to_vec()).await
    }

    pub async fn pending(&self) -> Vec<LogEntry> {
        self.read(|_, pending| pending.to_vec()).await
    }

    pub async fn len(&self) -> usize {
        self.read(|chain, _| chain.len()).await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn pending_count(&self) -> usize {
        self.read(|_, pending| pending.len()).await
    }

    pub async fn last_block(&self) -> Option<Block> {
        self.read(|chain, _| chain.last().cloned()).await
    }

    /// Apply an out-of-band modification to committed history, the way an
    /// attacker editing storage would. Only for exercising tamper detection.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn simulate_tampering(&self, f: impl FnOnce(&mut Vec<Block>)) {
        let mut state = self.state.write().await;
        f(&mut state.chain);
    }
}
