//! Deterministic in-process provider for tests.
//!
//! Vectors are normalized bag-of-words counts hashed into `dimensions`
//! buckets, so identical texts have similarity 1.0 and texts sharing no
//! words are (almost always) orthogonal.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::provider::EmbeddingProvider;
use super::types::ProviderInfo;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct FakeState {
    calls: AtomicUsize,
    batch_calls: AtomicUsize,
    failing: AtomicBool,
    fail_on: Mutex<HashSet<String>>,
    history: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Fake embedding provider. Clones share call counters and switches.
#[derive(Debug, Clone)]
pub struct FakeProvider {
    dimensions: usize,
    state: Arc<FakeState>,
}

impl FakeProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            state: Arc::default(),
        }
    }

    /// Number of single-text calls made.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Number of batch calls made.
    pub fn batch_calls(&self) -> usize {
        self.state.batch_calls.load(Ordering::SeqCst)
    }

    /// Every text passed to a single-text call, in call order.
    pub fn history(&self) -> Vec<String> {
        self.state.history.lock().unwrap().clone()
    }

    /// Make every call fail.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold every single-text call open for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    /// Highest number of single-text calls that were open at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Make calls for this exact text fail.
    pub fn fail_on(&self, text: &str) {
        self.state.fail_on.lock().unwrap().insert(text.to_string());
    }

    fn check(&self, text: &str) -> Result<()> {
        if self.state.failing.load(Ordering::SeqCst)
            || self.state.fail_on.lock().unwrap().contains(text)
        {
            return Err(Error::Embedding(format!("fake provider refused: {text}")));
        }
        Ok(())
    }

    /// The vector this provider returns for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) % self.dimensions as u64;
            vector[bucket as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

impl EmbeddingProvider for FakeProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "fake".to_string(),
            model: "bag-of-words".to_string(),
            dimensions: self.dimensions,
            available: true,
        }
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.history.lock().unwrap().push(text.to_string());

        let open = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(open, Ordering::SeqCst);
        let delay = *self.state.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check(text)?;
        Ok(self.vector_for(text))
    }

    async fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.state.batch_calls.fetch_add(1, Ordering::SeqCst);
        for text in texts {
            self.check(text)?;
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}
