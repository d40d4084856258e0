//! Timer and reminder tools, backed by the process-wide [`Scheduler`].
//!
//! Every recoverable problem (bad seconds, unknown id) comes back as result
//! text so the model can correct itself on the next turn.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use talkbot_core::error::{SchedulerError, ToolError};
use talkbot_core::provider::ToolParameter;
use talkbot_core::tool::Tool;
use talkbot_scheduler::{Scheduler, TimerId, TimerKind};
use tracing::debug;

use crate::args;

const SECONDS_ERROR: &str = "Error: seconds must be a positive integer";

fn seconds(arguments: &Map<String, Value>, aliases: &[&str]) -> Option<u64> {
    args::lookup(arguments, aliases).and_then(args::positive_seconds)
}

/// Out-of-range durations go back to the model as text; anything else is a
/// tool failure.
fn schedule(
    scheduler: &Scheduler,
    tool: &str,
    kind: TimerKind,
    secs: u64,
    payload: &str,
) -> Result<Result<TimerId, String>, ToolError> {
    match scheduler.set(kind, Duration::from_secs(secs), payload) {
        Ok(id) => Ok(Ok(id)),
        Err(e @ SchedulerError::InvalidDuration(_)) => Ok(Err(format!("Error: {e}"))),
        Err(e) => Err(ToolError::execution(tool, e)),
    }
}

pub struct SetTimerTool {
    scheduler: Scheduler,
}

impl SetTimerTool {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for SetTimerTool {
    fn name(&self) -> &str {
        "set_timer"
    }

    fn description(&self) -> &str {
        "Set a countdown timer with an optional label. Use this for cooking, workouts, or simple countdowns. When done it says '{label} is done!'. For a custom spoken message use set_reminder instead."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::integer("seconds", "Number of seconds to wait before the timer fires")
                .required(),
            ToolParameter::string(
                "label",
                "Optional name for the timer (e.g., 'pasta', '10-minute break')",
            )
            .with_default(""),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let Some(secs) = seconds(arguments, &["seconds", "duration", "time", "secs", "sec"]) else {
            return Ok(SECONDS_ERROR.into());
        };
        let label = args::text_or(
            args::lookup(arguments, &["label", "name"]),
            &format!("{secs}-second timer"),
        );

        let id = match schedule(&self.scheduler, self.name(), TimerKind::Timer, secs, &label)? {
            Ok(id) => id,
            Err(text) => return Ok(text),
        };
        Ok(format!("Timer #{id} set. '{label}' will fire in {secs} seconds."))
    }
}

pub struct SetReminderTool {
    scheduler: Scheduler,
}

impl SetReminderTool {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for SetReminderTool {
    fn name(&self) -> &str {
        "set_reminder"
    }

    fn description(&self) -> &str {
        "Set a reminder that speaks a custom message when it fires. Use this when the user says 'remind me to...' or wants a specific message spoken at a future time."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::integer("seconds", "Number of seconds until the reminder fires")
                .required(),
            ToolParameter::string(
                "message",
                "The exact message to speak when the reminder fires (e.g., 'Time to take your medication')",
            )
            .required(),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let Some(secs) = seconds(arguments, &["seconds", "duration", "time"]) else {
            return Ok(SECONDS_ERROR.into());
        };
        let message = args::text(arguments.get("message"));
        if message.is_empty() {
            return Ok("Error: message must not be empty".into());
        }

        let id = match schedule(&self.scheduler, self.name(), TimerKind::Reminder, secs, &message)? {
            Ok(id) => id,
            Err(text) => return Ok(text),
        };

        let (mins, rest) = (secs / 60, secs % 60);
        let span = if mins > 0 {
            format!("{mins}m {rest}s")
        } else {
            format!("{rest}s")
        };
        Ok(format!("Reminder #{id} set for {span}: \"{message}\""))
    }
}

pub struct CancelTimerTool {
    scheduler: Scheduler,
}

impl CancelTimerTool {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for CancelTimerTool {
    fn name(&self) -> &str {
        "cancel_timer"
    }

    fn description(&self) -> &str {
        "Cancel an active timer by its ID"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::string("timer_id", "The timer ID returned by set_timer (e.g., '1')")
                .required(),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let key = args::text(args::lookup(arguments, &["timer_id", "id", "timer", "timerid"]));
        if key.is_empty() {
            return Ok("Error: timer_id must not be empty.".into());
        }

        let cancelled = key
            .parse::<TimerId>()
            .and_then(|id| self.scheduler.cancel(id));
        match cancelled {
            Ok(snapshot) => Ok(format!(
                "Timer #{} ('{}') cancelled.",
                snapshot.id, snapshot.payload
            )),
            Err(e) => {
                debug!(timer_id = %key, error = %e, "Cancel rejected");
                Ok(format!(
                    "No active timer with ID '{key}'. Use list_timers to see active timers."
                ))
            }
        }
    }
}

pub struct ListTimersTool {
    scheduler: Scheduler,
}

impl ListTimersTool {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for ListTimersTool {
    fn name(&self) -> &str {
        "list_timers"
    }

    fn description(&self) -> &str {
        "List all currently active timers and their remaining time"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let pending = self.scheduler.list();
        if pending.is_empty() {
            return Ok("No active timers.".into());
        }
        Ok(pending
            .iter()
            .map(|t| {
                format!(
                    "#{}: '{}' - {}s remaining",
                    t.id,
                    t.payload,
                    t.remaining.as_secs()
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use talkbot_core::alert::AlertSlot;
    use talkbot_scheduler::TimerState;
    use tokio::sync::mpsc;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn recording_scheduler() -> (Scheduler, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let slot = AlertSlot::new();
        slot.set(Arc::new(move |text: &str| {
            let _ = tx.send(text.to_string());
        }));
        (Scheduler::new(slot), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn set_timer_reports_id_and_label() {
        let (scheduler, _rx) = recording_scheduler();
        let tool = SetTimerTool::new(scheduler.clone());

        let out = tool
            .execute(&args(json!({"seconds": 120, "label": "tea"})))
            .await
            .unwrap();
        assert_eq!(out, "Timer #1 set. 'tea' will fire in 120 seconds.");
        assert_eq!(scheduler.list().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_timer_accepts_aliases_and_default_label() {
        let (scheduler, _rx) = recording_scheduler();
        let tool = SetTimerTool::new(scheduler);

        let out = tool
            .execute(&args(json!({"duration": "10 secs"})))
            .await
            .unwrap();
        assert_eq!(out, "Timer #1 set. '10-second timer' will fire in 10 seconds.");
    }

    #[tokio::test(start_paused = true)]
    async fn set_timer_rejects_non_positive_seconds() {
        let (scheduler, _rx) = recording_scheduler();
        let tool = SetTimerTool::new(scheduler.clone());

        for bad in [json!({"seconds": 0}), json!({"seconds": -3}), json!({})] {
            let out = tool.execute(&args(bad)).await.unwrap();
            assert_eq!(out, SECONDS_ERROR);
        }
        assert!(scheduler.list().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_with_label_text() {
        let (scheduler, mut rx) = recording_scheduler();
        let tool = SetTimerTool::new(scheduler);

        tool.execute(&args(json!({"seconds": 2, "label": "tea"})))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(rx.recv().await.unwrap(), "tea is done!");
    }

    #[tokio::test(start_paused = true)]
    async fn reminder_formats_minutes_and_fires_message() {
        let (scheduler, mut rx) = recording_scheduler();
        let tool = SetReminderTool::new(scheduler);

        let out = tool
            .execute(&args(json!({"time": 90, "message": "stretch"})))
            .await
            .unwrap();
        assert_eq!(out, "Reminder #1 set for 1m 30s: \"stretch\"");

        tokio::time::sleep(Duration::from_secs(91)).await;
        assert_eq!(rx.recv().await.unwrap(), "stretch");
    }

    #[tokio::test(start_paused = true)]
    async fn reminder_needs_message() {
        let (scheduler, _rx) = recording_scheduler();
        let out = SetReminderTool::new(scheduler)
            .execute(&args(json!({"seconds": 5, "message": "  "})))
            .await
            .unwrap();
        assert_eq!(out, "Error: message must not be empty");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_by_alias_then_again() {
        let (scheduler, mut rx) = recording_scheduler();
        SetTimerTool::new(scheduler.clone())
            .execute(&args(json!({"seconds": 2, "label": "tea"})))
            .await
            .unwrap();
        let cancel = CancelTimerTool::new(scheduler.clone());

        let out = cancel.execute(&args(json!({"id": "#1"}))).await.unwrap();
        assert_eq!(out, "Timer #1 ('tea') cancelled.");
        assert_eq!(scheduler.state(TimerId(1)), Some(TimerState::Cancelled));

        let again = cancel.execute(&args(json!({"timer_id": 1}))).await.unwrap();
        assert!(again.starts_with("No active timer with ID '1'"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_rejects_garbage_ids() {
        let (scheduler, _rx) = recording_scheduler();
        let cancel = CancelTimerTool::new(scheduler);
        assert_eq!(
            cancel.execute(&Map::new()).await.unwrap(),
            "Error: timer_id must not be empty."
        );
        assert!(
            cancel
                .execute(&args(json!({"timer_id": "pasta"})))
                .await
                .unwrap()
                .starts_with("No active timer with ID 'pasta'")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn list_shows_remaining_seconds() {
        let (scheduler, _rx) = recording_scheduler();
        let list = ListTimersTool::new(scheduler.clone());
        assert_eq!(list.execute(&Map::new()).await.unwrap(), "No active timers.");

        scheduler
            .set(TimerKind::Timer, Duration::from_secs(60), "pasta")
            .unwrap();
        scheduler
            .set(TimerKind::Reminder, Duration::from_secs(30), "call mom")
            .unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        let out = list.execute(&Map::new()).await.unwrap();
        assert_eq!(
            out,
            "#1: 'pasta' - 50s remaining\n#2: 'call mom' - 20s remaining"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn huge_durations_are_refused_without_breaking_the_table() {
        let (scheduler, _rx) = recording_scheduler();
        let timer = SetTimerTool::new(scheduler.clone());
        let reminder = SetReminderTool::new(scheduler.clone());
        let list = ListTimersTool::new(scheduler.clone());

        for huge in [json!({"seconds": 1e20}), json!({"seconds": "99999999999999999999 secs"})] {
            let out = timer.execute(&args(huge)).await.unwrap();
            assert_eq!(
                out,
                "Error: Invalid timer duration: duration must not exceed 31536000 seconds"
            );
        }
        let out = reminder
            .execute(&args(json!({"seconds": 1e20, "message": "never"})))
            .await
            .unwrap();
        assert!(out.starts_with("Error: Invalid timer duration"));
        assert_eq!(list.execute(&Map::new()).await.unwrap(), "No active timers.");

        // Timers within range keep working next to the refused ones.
        timer
            .execute(&args(json!({"seconds": 30, "label": "tea"})))
            .await
            .unwrap();
        assert_eq!(
            list.execute(&Map::new()).await.unwrap(),
            "#1: 'tea' - 30s remaining"
        );
    }
}
