//! Scheduled callbacks (timers and reminders) for Talkbot.
//!
//! Every timer gets its own Tokio task that races a sleep against a
//! [`CancellationToken`]. The table of timers sits behind one mutex; the
//! state transition `pending → fired | cancelled` only ever happens under
//! it, which is what makes firing exactly-once and mutually exclusive with
//! cancellation. Alert callbacks run on the blocking pool, outside the lock.
//!
//! Timers live in memory only and are lost when the process exits.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use talkbot_core::alert::AlertSlot;
use talkbot_core::error::SchedulerError;
use talkbot_core::event::{DomainEvent, EventBus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest delay a timer may be set for (one year).
pub const MAX_FIRE_AFTER: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Monotonically assigned timer id. Never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TimerId {
    type Err = SchedulerError;

    /// Accepts `"3"` and `"#3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .trim_start_matches('#')
            .parse()
            .map(TimerId)
            .map_err(|_| SchedulerError::TimerNotFound(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    /// Payload is a label; fires as "{label} is done!"
    Timer,
    /// Payload is the message spoken verbatim
    Reminder,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Timer => "timer",
            TimerKind::Reminder => "reminder",
        }
    }

    /// The text handed to the alert callback on fire.
    pub fn alert_text(&self, payload: &str) -> String {
        match self {
            TimerKind::Timer => format!("{payload} is done!"),
            TimerKind::Reminder => payload.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Pending,
    Fired,
    Cancelled,
}

/// A point-in-time view of one timer.
#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub kind: TimerKind,
    pub payload: String,
    pub fire_after: Duration,
    pub created_at: DateTime<Utc>,
    pub remaining: Duration,
    pub state: TimerState,
}

struct Entry {
    kind: TimerKind,
    payload: String,
    fire_after: Duration,
    created_at: DateTime<Utc>,
    started: Instant,
    state: TimerState,
    token: CancellationToken,
}

impl Entry {
    fn snapshot(&self, id: u64, now: Instant) -> TimerSnapshot {
        let remaining = self
            .started
            .checked_add(self.fire_after)
            .map_or(Duration::MAX, |deadline| deadline.saturating_duration_since(now));
        TimerSnapshot {
            id: TimerId(id),
            kind: self.kind,
            payload: self.payload.clone(),
            fire_after: self.fire_after,
            created_at: self.created_at,
            remaining,
            state: self.state,
        }
    }
}

#[derive(Default)]
struct Table {
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

struct Inner {
    table: Mutex<Table>,
    alert: AlertSlot,
    events: Option<Arc<EventBus>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

/// Owns every timer and reminder of one process. Cheap to clone; clones
/// share the same table.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler that speaks through `alert` when timers fire.
    pub fn new(alert: AlertSlot) -> Self {
        Self::build(alert, None)
    }

    /// Same as [`Scheduler::new`], publishing timer events on `bus`.
    pub fn with_event_bus(alert: AlertSlot, bus: Arc<EventBus>) -> Self {
        Self::build(alert, Some(bus))
    }

    fn build(alert: AlertSlot, events: Option<Arc<EventBus>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(Table::default()),
                alert,
                events,
            }),
        }
    }

    pub fn alert_slot(&self) -> &AlertSlot {
        &self.inner.alert
    }

    /// Schedule `payload` to fire after `fire_after`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set(
        &self,
        kind: TimerKind,
        fire_after: Duration,
        payload: impl Into<String>,
    ) -> Result<TimerId, SchedulerError> {
        if fire_after.is_zero() {
            return Err(SchedulerError::InvalidDuration(
                "duration must be greater than zero".into(),
            ));
        }
        if fire_after > MAX_FIRE_AFTER {
            return Err(SchedulerError::InvalidDuration(format!(
                "duration must not exceed {} seconds",
                MAX_FIRE_AFTER.as_secs()
            )));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let token = CancellationToken::new();
        let id = {
            let mut table = self.inner.lock();
            table.next_id += 1;
            let id = table.next_id;
            table.entries.insert(
                id,
                Entry {
                    kind,
                    payload: payload.into(),
                    fire_after,
                    created_at: Utc::now(),
                    started: Instant::now(),
                    state: TimerState::Pending,
                    token: token.clone(),
                },
            );
            id
        };

        runtime.spawn(wait_then_fire(Arc::clone(&self.inner), id, fire_after, token));

        info!(timer_id = id, kind = kind.as_str(), secs = fire_after.as_secs_f64(), "Timer scheduled");
        self.inner.publish(DomainEvent::TimerScheduled {
            timer_id: id,
            kind: kind.as_str().into(),
            fire_after_ms: u64::try_from(fire_after.as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        });
        Ok(TimerId(id))
    }

    /// Cancel a pending timer, returning its last snapshot.
    ///
    /// Fails with [`SchedulerError::TimerNotFound`] when the id is unknown
    /// or the timer already fired or was cancelled.
    pub fn cancel(&self, id: TimerId) -> Result<TimerSnapshot, SchedulerError> {
        let snapshot = {
            let mut table = self.inner.lock();
            let entry = table
                .entries
                .get_mut(&id.0)
                .filter(|e| e.state == TimerState::Pending)
                .ok_or_else(|| SchedulerError::TimerNotFound(id.to_string()))?;
            entry.state = TimerState::Cancelled;
            entry.token.cancel();
            entry.snapshot(id.0, Instant::now())
        };

        info!(timer_id = id.0, "Timer cancelled");
        self.inner.publish(DomainEvent::TimerCancelled {
            timer_id: id.0,
            timestamp: Utc::now(),
        });
        Ok(snapshot)
    }

    /// All pending timers, oldest first.
    pub fn list(&self) -> Vec<TimerSnapshot> {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|(_, e)| e.state == TimerState::Pending)
            .map(|(id, e)| e.snapshot(*id, now))
            .collect()
    }

    pub fn state(&self, id: TimerId) -> Option<TimerState> {
        self.inner.lock().entries.get(&id.0).map(|e| e.state)
    }

    /// Cancel every pending timer and forget all entries. Ids keep counting
    /// up so a late task can never be confused with a new timer.
    pub fn reset(&self) {
        let mut table = self.inner.lock();
        for entry in table.entries.values() {
            entry.token.cancel();
        }
        let dropped = table.entries.len();
        table.entries.clear();
        debug!(dropped, "Scheduler reset");
    }
}

async fn wait_then_fire(inner: Arc<Inner>, id: u64, fire_after: Duration, token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {
            debug!(timer_id = id, "Timer wait interrupted");
            return;
        }
        _ = tokio::time::sleep(fire_after) => {}
    }

    // Only a pending entry may fire; a cancel that raced the sleep wins.
    let (kind, payload) = {
        let mut table = inner.lock();
        let Some(entry) = table.entries.get_mut(&id) else {
            return;
        };
        if entry.state != TimerState::Pending {
            return;
        }
        entry.state = TimerState::Fired;
        (entry.kind, entry.payload.clone())
    };

    let text = kind.alert_text(&payload);
    info!(timer_id = id, kind = kind.as_str(), text = %text, "Timer fired");
    inner.publish(DomainEvent::TimerFired {
        timer_id: id,
        kind: kind.as_str().into(),
        timestamp: Utc::now(),
    });

    match inner.alert.get() {
        Some(callback) => {
            if let Err(e) = tokio::task::spawn_blocking(move || callback(&text)).await {
                warn!(timer_id = id, error = %e, "Alert callback panicked");
            }
        }
        None => info!(timer_id = id, text = %text, "No alert callback installed"),
    }
}
