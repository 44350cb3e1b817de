//! Batch accumulator
//!
//! Bounded buffer between the parser and storage. Items are collected in
//! insertion order and handed to `on_received` in batches of at most `limit`
//! items, so peak memory stays bounded regardless of playlist size.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

pub struct Accumulator<T, F> {
    limit: usize,
    items: Mutex<Vec<T>>,
    /// Serializes flushes so batches reach storage in order
    flush_lock: tokio::sync::Mutex<()>,
    on_received: F,
}

impl<T, F, Fut, E> Accumulator<T, F>
where
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    pub fn new(limit: usize, on_received: F) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            items: Mutex::new(Vec::with_capacity(limit)),
            flush_lock: tokio::sync::Mutex::new(()),
            on_received,
        }
    }

    fn items(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of buffered, unflushed items
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an item, flushing full batches
    pub async fn push(&self, item: T) -> Result<(), E> {
        let full = {
            let mut items = self.items();
            items.push(item);
            items.len() >= self.limit
        };

        if !full {
            return Ok(());
        }

        let _guard = self.flush_lock.lock().await;

        loop {
            // Another pusher may have flushed while we waited for the lock
            let batch: Vec<T> = {
                let mut items = self.items();
                if items.len() < self.limit {
                    return Ok(());
                }
                items.drain(..self.limit).collect()
            };

            (self.on_received)(batch).await?;
        }
    }

    /// Write whatever remains. Called once at stream end, and on cancellation
    /// so partial progress is kept.
    pub async fn flush(&self) -> Result<(), E> {
        let _guard = self.flush_lock.lock().await;

        let batch = std::mem::take(&mut *self.items());
        if batch.is_empty() {
            return Ok(());
        }

        (self.on_received)(batch).await
    }

    /// Drop buffered items without writing them
    pub fn discard(&self) -> usize {
        let mut items = self.items();
        let count = items.len();
        items.clear();
        count
    }
}
