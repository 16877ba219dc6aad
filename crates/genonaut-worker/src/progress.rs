//! Per-job progress channel (C7's progress side, §4.8).
//!
//! A process-wide map from `job_id` to a fan-out broadcast channel. The
//! channel is created on `pending -> running` and "closes" on the terminal
//! event: subscribers connected before the close keep receiving events off
//! the broadcast channel; subscribers connecting after close are handed the
//! cached terminal event once, then nothing — no history is backfilled (the
//! resolved Open Question in §9/§10.7).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use genonaut_core::types::ProgressEvent;

const CHANNEL_CAPACITY: usize = 64;

struct JobChannel {
    tx: broadcast::Sender<ProgressEvent>,
    terminal: Option<ProgressEvent>,
}

#[derive(Default)]
pub struct ProgressHub {
    channels: RwLock<HashMap<i64, JobChannel>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Create the channel for a job entering `running`. Idempotent — a
    /// second call for the same job is a no-op.
    pub async fn open(&self, job_id: i64) {
        let mut channels = self.channels.write().await;
        channels.entry(job_id).or_insert_with(|| {
            let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
            JobChannel { tx, terminal: None }
        });
    }

    /// Publish an event. Terminal events are cached for late subscribers
    /// and the channel's subscriber count subsequently reflects only
    /// subscribers still attached to the live broadcast side.
    pub async fn publish(&self, event: ProgressEvent) {
        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(event.job_id)
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
                JobChannel { tx, terminal: None }
            });
        if event.state.is_terminal() {
            channel.terminal = Some(event.clone());
        }
        // No receivers is not an error — it only means nobody is subscribed
        // right now; the terminal cache still serves late subscribers.
        let _ = channel.tx.send(event);
    }

    pub async fn subscriber_count(&self, job_id: i64) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(&job_id)
            .map(|c| c.tx.receiver_count())
            .unwrap_or(0)
    }

    pub async fn subscribe(&self, job_id: i64) -> ProgressSubscription {
        let channels = self.channels.read().await;
        match channels.get(&job_id) {
            Some(channel) => match &channel.terminal {
                Some(terminal) => ProgressSubscription::Closed(Some(terminal.clone())),
                None => ProgressSubscription::Live(channel.tx.subscribe()),
            },
            None => ProgressSubscription::Closed(None),
        }
    }
}

/// A single subscriber's view of a job's progress channel (§4.8 "finite
/// lazy sequence, terminates on terminal state").
pub enum ProgressSubscription {
    Live(broadcast::Receiver<ProgressEvent>),
    Closed(Option<ProgressEvent>),
}

impl ProgressSubscription {
    /// Await the next event, or `None` once the sequence has terminated.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        match self {
            ProgressSubscription::Closed(cached) => cached.take(),
            ProgressSubscription::Live(rx) => loop {
                match rx.recv().await {
                    Ok(event) => {
                        if event.state.is_terminal() {
                            *self = ProgressSubscription::Closed(None);
                        }
                        return Some(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        *self = ProgressSubscription::Closed(None);
                        return None;
                    }
                }
            },
        }
    }
}

pub type SharedProgressHub = Arc<ProgressHub>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use genonaut_core::types::JobState;

    fn event(job_id: i64, state: JobState, seq: u64) -> ProgressEvent {
        ProgressEvent {
            job_id,
            state,
            seq,
            percent: None,
            queue_position: None,
            ts: Utc::now(),
        }
    }

    #[tokio::test]
    async fn live_subscriber_receives_published_events_in_order() {
        let hub = ProgressHub::new();
        hub.open(1).await;
        let mut sub = hub.subscribe(1).await;
        hub.publish(event(1, JobState::Running, 1)).await;
        hub.publish(event(1, JobState::Completed, 2)).await;

        assert_eq!(sub.next().await.unwrap().seq, 1);
        let terminal = sub.next().await.unwrap();
        assert_eq!(terminal.seq, 2);
        assert!(terminal.state.is_terminal());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn late_subscriber_after_terminal_gets_only_the_cached_event() {
        let hub = ProgressHub::new();
        hub.open(2).await;
        hub.publish(event(2, JobState::Running, 1)).await;
        hub.publish(event(2, JobState::Completed, 2)).await;

        let mut late = hub.subscribe(2).await;
        let first = late.next().await.unwrap();
        assert_eq!(first.seq, 2);
        assert!(late.next().await.is_none());
    }

    #[tokio::test]
    async fn subscribing_to_unknown_job_yields_empty_sequence() {
        let hub = ProgressHub::new();
        let mut sub = hub.subscribe(999).await;
        assert!(sub.next().await.is_none());
    }
}
