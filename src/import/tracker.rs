use crate::import::batch::Batch;
use crate::import::encoder::{EncodeError, Encoder};
use crate::import::file_key::{FileKey, FileRef};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, trace, warn};

/// Conversion state of one FileKey
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionState {
    /// Tracked, waiting for an encode slot
    Queued,
    /// Encoder is working on it
    InFlight,
    /// Encoded payload, ready to submit
    Ready(String),
    /// Encode failed. Stays failed until retried.
    Failed(String),
}

impl ConversionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConversionState::Ready(_))
    }

    /// Queued or in flight
    pub fn is_pending(&self) -> bool {
        matches!(self, ConversionState::Queued | ConversionState::InFlight)
    }
}

/// Observable change produced by applying one encode task message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionUpdate {
    Started(FileKey),
    Ready(FileKey),
    Failed { key: FileKey, reason: String },
    /// Completion for an entry that was removed (or removed and re-added) meanwhile
    Discarded(FileKey),
}

/// Message sent from an encode task back to the tracker
#[derive(Debug)]
enum TaskEvent {
    Started {
        key: FileKey,
        ticket: u64,
    },
    Finished {
        key: FileKey,
        ticket: u64,
        result: Result<String, EncodeError>,
    },
}

#[derive(Debug)]
struct TrackedFile {
    file: FileRef,
    ordinal: u64,
    /// Identifies the submission whose result this entry will accept
    ticket: u64,
    /// Cleared once the submission is superseded or the entry is dropped
    live: Arc<AtomicBool>,
    state: ConversionState,
}

impl TrackedFile {
    fn release(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Keeps every key of the batch submitted to the encoder exactly once.
///
/// Encodes run as tokio tasks and report back over a channel. Results are only
/// applied when the owner polls, so state changes happen one message at a time
/// on the owner's side and never interleave.
///
/// `sync` spawns tasks and must be called from within a tokio runtime.
pub struct ConversionTracker {
    encoder: Arc<dyn Encoder>,
    permits: Option<Arc<Semaphore>>,
    entries: HashMap<FileKey, TrackedFile>,
    next_ordinal: u64,
    next_ticket: u64,
    events_tx: mpsc::UnboundedSender<TaskEvent>,
    events_rx: mpsc::UnboundedReceiver<TaskEvent>,
}

impl ConversionTracker {
    /// Create a tracker. `concurrency` of None runs one encode per key with no limit.
    pub fn new(encoder: Arc<dyn Encoder>, concurrency: Option<usize>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            encoder,
            permits: concurrency.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            entries: HashMap::new(),
            next_ordinal: 0,
            next_ticket: 0,
            events_tx,
            events_rx,
        }
    }

    /// Reconcile tracked entries with the batch's current file list.
    ///
    /// Keys no longer in the batch are forgotten. Keys seen for the first time
    /// get an ordinal and are submitted. Keys already tracked in any state are
    /// left alone, so calling this after every list change never re-triggers work.
    /// Returns the number of newly submitted keys.
    pub fn sync(&mut self, batch: &Batch) -> usize {
        let present: HashSet<FileKey> = batch.files().iter().map(FileRef::key).collect();

        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = present.contains(key);
            if !keep {
                entry.release();
            }
            keep
        });
        let forgotten = before - self.entries.len();
        if forgotten > 0 {
            debug!("Forgot {} removed file(s)", forgotten);
        }

        let mut submitted = 0;
        for file in batch.files() {
            let key = file.key();
            if self.entries.contains_key(&key) {
                continue;
            }

            let ordinal = self.next_ordinal;
            self.next_ordinal += 1;
            self.entries.insert(
                key.clone(),
                TrackedFile {
                    file: file.clone(),
                    ordinal,
                    ticket: 0,
                    live: Arc::new(AtomicBool::new(false)),
                    state: ConversionState::Queued,
                },
            );
            self.submit(&key);
            submitted += 1;
        }

        submitted
    }

    /// Resubmit a failed entry. Returns false if the key isn't tracked or hasn't failed.
    pub fn retry(&mut self, key: &FileKey) -> bool {
        match self.entries.get(key) {
            Some(entry) if matches!(entry.state, ConversionState::Failed(_)) => {
                debug!("Retrying {}", key);
                self.submit(key);
                true
            }
            _ => false,
        }
    }

    /// Forget every entry. Encodes still running finish into the void;
    /// queued ones are skipped.
    pub fn clear(&mut self) {
        for entry in self.entries.values() {
            entry.release();
        }
        self.entries.clear();
    }

    fn submit(&mut self, key: &FileKey) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        entry.ticket = ticket;
        entry.release();
        entry.live = Arc::new(AtomicBool::new(true));
        // Without a limit the encoder claims the file immediately
        entry.state = if self.permits.is_some() {
            ConversionState::Queued
        } else {
            ConversionState::InFlight
        };

        let file = entry.file.clone();
        let key = key.clone();
        let encoder = self.encoder.clone();
        let permits = self.permits.clone();
        let live = entry.live.clone();
        let tx = self.events_tx.clone();

        trace!("Submitting {} (ticket {})", key, ticket);

        tokio::spawn(async move {
            let _permit = match permits {
                Some(semaphore) => {
                    let permit = semaphore.acquire_owned().await.ok();
                    // Removed while waiting for a slot: nobody wants the payload
                    if !live.load(Ordering::Acquire) {
                        trace!("Skipping {} (ticket {}), no longer tracked", key, ticket);
                        return;
                    }
                    let _ = tx.send(TaskEvent::Started {
                        key: key.clone(),
                        ticket,
                    });
                    permit
                }
                None => None,
            };

            let result = encoder.encode(&file).await;

            // Receiver is gone when the owning session was dropped
            let _ = tx.send(TaskEvent::Finished {
                key,
                ticket,
                result,
            });
        });
    }

    fn apply(&mut self, event: TaskEvent) -> Option<ConversionUpdate> {
        match event {
            TaskEvent::Started { key, ticket } => match self.entries.get_mut(&key) {
                Some(entry) if entry.ticket == ticket && entry.state == ConversionState::Queued => {
                    entry.state = ConversionState::InFlight;
                    debug!("Converting {}", key);
                    Some(ConversionUpdate::Started(key))
                }
                _ => None,
            },
            TaskEvent::Finished {
                key,
                ticket,
                result,
            } => match self.entries.get_mut(&key) {
                Some(entry) if entry.ticket == ticket => match result {
                    Ok(payload) => {
                        debug!("Converted {} ({} chars)", key, payload.len());
                        entry.state = ConversionState::Ready(payload);
                        Some(ConversionUpdate::Ready(key))
                    }
                    Err(e) => {
                        warn!("Failed to convert {}: {}", key, e);
                        let reason = e.to_string();
                        entry.state = ConversionState::Failed(reason.clone());
                        Some(ConversionUpdate::Failed { key, reason })
                    }
                },
                _ => {
                    debug!("Discarding stale conversion result for {}", key);
                    Some(ConversionUpdate::Discarded(key))
                }
            },
        }
    }

    /// Apply every result that has already arrived, without waiting
    pub fn poll(&mut self) -> Vec<ConversionUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            if let Some(update) = self.apply(event) {
                updates.push(update);
            }
        }
        updates
    }

    /// Wait for the next state change.
    /// Returns None once nothing is queued or in flight.
    pub async fn next_update(&mut self) -> Option<ConversionUpdate> {
        loop {
            while let Ok(event) = self.events_rx.try_recv() {
                if let Some(update) = self.apply(event) {
                    return Some(update);
                }
            }

            if self.pending_count() == 0 {
                return None;
            }

            // The tracker holds a sender, so the channel never closes under us
            let event = self.events_rx.recv().await?;
            if let Some(update) = self.apply(event) {
                return Some(update);
            }
        }
    }

    /// Wait until every tracked entry is Ready or Failed
    pub async fn settle(&mut self) -> Vec<ConversionUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            updates.push(update);
        }
        updates
    }

    pub fn state(&self, key: &FileKey) -> Option<&ConversionState> {
        self.entries.get(key).map(|e| &e.state)
    }

    pub fn ordinal(&self, key: &FileKey) -> Option<u64> {
        self.entries.get(key).map(|e| e.ordinal)
    }

    /// Tracked keys and their states, in ordinal order
    pub fn entries(&self) -> Vec<(&FileKey, &ConversionState)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(_, e)| e.ordinal);
        entries.into_iter().map(|(k, e)| (k, &e.state)).collect()
    }

    /// Encoded payloads of all Ready entries, in ordinal order
    pub fn ready_payloads(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|(_, state)| match state {
                ConversionState::Ready(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|e| e.state.is_pending()).count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.state == ConversionState::InFlight)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e.state, ConversionState::Failed(_)))
            .count()
    }

    pub fn is_settled(&self) -> bool {
        self.pending_count() == 0
    }
}
