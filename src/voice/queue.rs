//! Sentence-level speech queue
//!
//! A single worker drains the queue so utterances never overlap, however
//! quickly text arrives. [`SpeechQueue::cancel`] drops everything pending and
//! interrupts the utterance in progress.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?\n]+(?:[.!?\n]+|$)").expect("valid regex"));

/// Plays one utterance to completion
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Strip markdown emphasis and split into trimmed, non-empty sentences
///
/// A trailing fragment without a terminator is kept.
#[must_use]
pub fn segment(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`'))
        .collect();

    SENTENCE
        .find_iter(&cleaned)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

struct Shared {
    pending: Mutex<VecDeque<String>>,
    /// Token for the utterance currently playing; replaced on every cancel
    current: Mutex<CancellationToken>,
    wake: Notify,
    /// Signalled each time the worker finds the queue empty
    idle: Notify,
    speaking: AtomicBool,
    shutdown: CancellationToken,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> MutexGuard<'_, CancellationToken> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        self.pending().clear();

        let mut current = self.current();
        current.cancel();
        *current = CancellationToken::new();
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst) || !self.pending().is_empty()
    }

    /// Pop the next fragment together with the token that may interrupt it
    fn next(&self) -> Option<(String, CancellationToken)> {
        let mut pending = self.pending();
        let text = pending.pop_front()?;
        Some((text, self.current().clone()))
    }
}

/// Cloneable handle that silences a [`SpeechQueue`] from another task
#[derive(Clone)]
pub struct SpeechCanceller(Arc<Shared>);

impl SpeechCanceller {
    /// Drop pending fragments and stop the current utterance
    pub fn cancel(&self) {
        self.0.cancel();
    }
}

impl std::fmt::Debug for SpeechCanceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SpeechCanceller").finish()
    }
}

/// FIFO of speech fragments with exactly one playback worker
pub struct SpeechQueue {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for SpeechQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechQueue")
            .field("pending", &self.shared.pending().len())
            .field("speaking", &self.shared.speaking.load(Ordering::SeqCst))
            .finish()
    }
}

impl SpeechQueue {
    /// Spawn the playback worker on the current runtime
    #[must_use]
    pub fn spawn(speaker: Arc<dyn Speaker>) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(VecDeque::new()),
            current: Mutex::new(CancellationToken::new()),
            wake: Notify::new(),
            idle: Notify::new(),
            speaking: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });

        let worker = tokio::spawn(run_worker(Arc::clone(&shared), speaker));
        Self { shared, worker }
    }

    /// Queue `text` for playback, one fragment per sentence
    pub fn speak(&self, text: &str) {
        let fragments = segment(text);
        if fragments.is_empty() {
            return;
        }

        self.shared.pending().extend(fragments);
        self.shared.wake.notify_one();
    }

    /// Drop pending fragments and stop the current utterance
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Handle for cancelling speech without holding the queue
    #[must_use]
    pub fn canceller(&self) -> SpeechCanceller {
        SpeechCanceller(Arc::clone(&self.shared))
    }

    /// Whether anything is playing or waiting to play
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.shared.is_speaking()
    }

    /// Wait until the queue has drained
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.shared.idle.notified();
            tokio::pin!(idle);
            // Register before checking so a signal in between is not lost
            idle.as_mut().enable();
            if !self.shared.is_speaking() {
                return;
            }
            idle.await;
        }
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        self.cancel();
        self.shared.shutdown.cancel();
        self.worker.abort();
    }
}

async fn run_worker(shared: Arc<Shared>, speaker: Arc<dyn Speaker>) {
    loop {
        // Set before popping so `is_speaking` never observes a gap
        shared.speaking.store(true, Ordering::SeqCst);
        let Some((text, token)) = shared.next() else {
            shared.speaking.store(false, Ordering::SeqCst);
            shared.idle.notify_waiters();
            tokio::select! {
                () = shared.shutdown.cancelled() => break,
                () = shared.wake.notified() => continue,
            }
        };

        tokio::select! {
            () = token.cancelled() => {
                tracing::debug!(%text, "utterance interrupted");
            }
            result = speaker.speak(&text) => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "utterance failed; continuing");
                }
            }
        }
    }

    shared.speaking.store(false, Ordering::SeqCst);
    shared.idle.notify_waiters();
}
