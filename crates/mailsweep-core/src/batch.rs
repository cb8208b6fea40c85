//! Fixed-size batching of message references.

use std::num::NonZeroUsize;
use std::slice::Chunks;

use serde::Serialize;

use crate::transport::MessageRef;
use crate::{Error, Result};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// A validated, strictly positive batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatchSize(NonZeroUsize);

impl BatchSize {
    /// Accepts any signed value so that configuration mistakes like `0` or
    /// `-5` surface as a config error instead of a parse error.
    pub fn new(size: i64) -> Result<Self> {
        usize::try_from(size)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or_else(|| Error::config(format!("batch size must be positive, got {}", size)))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self(NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

/// Lazy sequence of consecutive batches over a borrowed list.
///
/// Cloning restarts iteration from the clone's current position.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    chunks: Chunks<'a, MessageRef>,
}

impl<'a> Iterator for Batches<'a> {
    type Item = &'a [MessageRef];

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Batches<'_> {}

pub fn plan(ids: &[MessageRef], batch_size: BatchSize) -> Batches<'_> {
    Batches {
        chunks: ids.chunks(batch_size.get()),
    }
}
