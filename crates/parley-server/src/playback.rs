//! Per-session playback cancellation.
//!
//! Each session has at most one *current* playback token. Starting a new
//! utterance installs a fresh token for that session, superseding the
//! previous one; `stop_playing` cancels whatever token is currently
//! installed. The scope is the session: stopping one caller's playback
//! never touches another session's stream.
//!
//! A superseded token is left as-is: an older stream that is still
//! draining keeps its own token and can no longer be reached by a stop
//! request, which matches the one-current-stream-per-session model.

use bytes::Bytes;
use futures_util::Stream;
use parley_voice::VoiceError;
use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct PlaybackEntry {
    generation: u64,
    token: CancellationToken,
}

/// Registry of the current playback token per session.
#[derive(Clone, Debug, Default)]
pub struct PlaybackRegistry {
    inner: Arc<Mutex<HashMap<String, PlaybackEntry>>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh cancellation token for the session, replacing any
    /// previous entry, and returns a handle that releases the entry on
    /// drop. Called unconditionally at the start of every utterance.
    pub fn begin(&self, session_id: &str) -> PlaybackHandle {
        let mut map = self.lock();
        let generation = map
            .get(session_id)
            .map(|entry| entry.generation.wrapping_add(1))
            .unwrap_or(0);
        let token = CancellationToken::new();
        map.insert(
            session_id.to_string(),
            PlaybackEntry {
                generation,
                token: token.clone(),
            },
        );
        PlaybackHandle {
            registry: self.clone(),
            session_id: session_id.to_string(),
            generation,
            token,
        }
    }

    /// Cancels the session's current token. Idempotent; returns whether a
    /// token was installed at all.
    pub fn stop(&self, session_id: &str) -> bool {
        match self.lock().get(session_id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes the entry, but only if it still belongs to `generation`:
    /// a newer request's token must survive an older stream's cleanup.
    fn finish(&self, session_id: &str, generation: u64) {
        let mut map = self.lock();
        if map
            .get(session_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            map.remove(session_id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PlaybackEntry>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("playback registry lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        }
    }
}

/// Handle for one utterance's playback slot.
///
/// Carries the cancellation token consulted between audio chunks and
/// releases the registry entry when dropped, whether the stream completed,
/// was cancelled, or never started.
#[derive(Debug)]
pub struct PlaybackHandle {
    registry: PlaybackRegistry,
    session_id: String,
    generation: u64,
    token: CancellationToken,
}

impl PlaybackHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.registry.finish(&self.session_id, self.generation);
    }
}

/// Audio byte stream that ends short once its playback token is cancelled.
///
/// The token is consulted before each chunk is yielded; after cancellation
/// is observed no further chunks are emitted and the stream ends without an
/// error, the client simply receives a shorter body. An upstream synthesis
/// failure mid-flight likewise ends the stream short: the 200 status and
/// partial body are already on the wire, so the failure is logged rather
/// than surfaced.
pub struct CancellableAudio {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, VoiceError>> + Send>>,
    handle: PlaybackHandle,
    done: bool,
}

impl CancellableAudio {
    pub fn new(
        inner: impl Stream<Item = Result<Bytes, VoiceError>> + Send + 'static,
        handle: PlaybackHandle,
    ) -> Self {
        Self {
            inner: Box::pin(inner),
            handle,
            done: false,
        }
    }
}

impl Stream for CancellableAudio {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.handle.is_cancelled() {
            this.done = true;
            tracing::debug!(
                session_id = %this.handle.session_id(),
                "playback cancelled, ending audio stream early"
            );
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                tracing::warn!(
                    session_id = %this.handle.session_id(),
                    "speech stream failed mid-flight: {}",
                    e
                );
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
