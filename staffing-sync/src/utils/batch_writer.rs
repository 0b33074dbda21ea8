//! Batched transaction writer
//!
//! All writes of a run go through one `BatchWriter`. It holds an open
//! transaction and commits it once `batch_size` successful outcomes have
//! accumulated (one per person, one per fragment of a persisted mission),
//! then opens the next one. In dry-run mode it never commits: the single
//! transaction spans the whole run and is rolled back by `finish`.
//!
//! A failure mid-run leaves earlier batches committed.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use staffing_common::{Error, Result};
use std::time::Instant;

pub struct BatchWriter<'c> {
    pool: &'c SqlitePool,
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    batch_size: usize,
    dry_run: bool,
    pending: usize,
    commits: usize,
    opened_at: Instant,
}

impl<'c> BatchWriter<'c> {
    /// Open the first transaction
    pub async fn begin(
        pool: &'c SqlitePool,
        batch_size: usize,
        dry_run: bool,
        caller: &'static str,
    ) -> Result<Self> {
        let tx = begin_logged(pool, caller).await?;

        Ok(Self {
            pool,
            tx: Some(tx),
            caller,
            batch_size: batch_size.max(1),
            dry_run,
            pending: 0,
            commits: 0,
            opened_at: Instant::now(),
        })
    }

    /// Connection of the open transaction
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.tx
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or_else(|| Error::Internal("Batch transaction already closed".to_string()))
    }

    /// Count `outcomes` successful outcomes, committing when the batch is full
    ///
    /// A mission group is recorded in one call, so a batch may overshoot
    /// `batch_size` by less than one group.
    pub async fn record_success(&mut self, outcomes: usize) -> Result<()> {
        self.pending += outcomes;

        if !self.dry_run && self.pending >= self.batch_size {
            self.commit_batch().await?;
            self.tx = Some(begin_logged(self.pool, self.caller).await?);
            self.opened_at = Instant::now();
        }

        Ok(())
    }

    /// Close the run: final commit, or rollback in dry-run mode
    ///
    /// Returns the number of commits performed.
    pub async fn finish(mut self) -> Result<usize> {
        if self.dry_run {
            let tx = self.take_tx()?;
            tx.rollback().await?;
            tracing::info!(
                caller = self.caller,
                outcomes = self.pending,
                "Dry run: transaction rolled back"
            );
            return Ok(0);
        }

        self.commit_batch().await?;
        Ok(self.commits)
    }

    async fn commit_batch(&mut self) -> Result<()> {
        let tx = self.take_tx()?;
        tx.commit().await?;

        self.commits += 1;
        let held_ms = self.opened_at.elapsed().as_millis();
        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms = held_ms,
                outcomes = self.pending,
                "Long batch transaction"
            );
        } else {
            tracing::debug!(
                caller = self.caller,
                held_ms = held_ms,
                outcomes = self.pending,
                "Batch committed"
            );
        }

        self.pending = 0;
        Ok(())
    }

    fn take_tx(&mut self) -> Result<Transaction<'c, Sqlite>> {
        self.tx
            .take()
            .ok_or_else(|| Error::Internal("Batch transaction already closed".to_string()))
    }
}

impl<'c> Drop for BatchWriter<'c> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            // sqlx rolls the open transaction back when it is dropped
            tracing::warn!(
                caller = self.caller,
                outcomes = self.pending,
                "Batch writer dropped with an open transaction; uncommitted batch rolled back"
            );
        }
    }
}

async fn begin_logged<'c>(pool: &'c SqlitePool, caller: &'static str) -> Result<Transaction<'c, Sqlite>> {
    let start = Instant::now();
    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > 1000 {
        tracing::warn!(caller = caller, wait_ms = wait_ms, "Slow transaction start");
    } else {
        tracing::debug!(caller = caller, wait_ms = wait_ms, "Transaction opened");
    }

    Ok(tx)
}
