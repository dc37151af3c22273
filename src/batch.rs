use crate::error::ConfigError;
use crate::schema::Record;
use crate::store::RecordStore;
use anyhow::Result;

/// What a writer pushed to the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub records: u64,
    pub batches: u64,
}

/// Buffers records and hands them to the store in batches of `capacity`,
/// keeping at most one batch in memory. Each flush is an independent write.
pub struct BatchWriter<'a> {
    store: &'a mut dyn RecordStore,
    capacity: usize,
    buf: Vec<Record>,
    stats: BatchStats,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a mut dyn RecordStore, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ConfigError::ZeroBatchCapacity.into());
        }
        Ok(Self { store, capacity, buf: Vec::with_capacity(capacity), stats: BatchStats::default() })
    }

    /// Writer sized with the store's default capacity.
    pub fn with_default_capacity(store: &'a mut dyn RecordStore) -> Self {
        let capacity = store.kind().default_batch_capacity();
        Self { store, capacity, buf: Vec::with_capacity(capacity), stats: BatchStats::default() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn push(&mut self, record: Record) -> Result<()> {
        self.buf.push(record);
        if self.buf.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Write out whatever is buffered. Nothing buffered means no store call.
    pub fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let n = self.buf.len();
        // The batch is gone either way; a failed write is not retried.
        let res = self.store.bulk_insert(&self.buf);
        self.buf.clear();
        res?;
        self.stats.records += n as u64;
        self.stats.batches += 1;
        tracing::debug!(records = n, batches = self.stats.batches, "batch flushed");
        Ok(())
    }

    /// Flush the remainder and report totals.
    pub fn finish(mut self) -> Result<BatchStats> {
        self.flush()?;
        Ok(self.stats)
    }
}
