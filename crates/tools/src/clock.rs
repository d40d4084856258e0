//! Time and date tools.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use talkbot_core::error::ToolError;
use talkbot_core::provider::ToolParameter;
use talkbot_core::tool::Tool;

use crate::args;

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        Ok(Local::now().format("%Y-%m-%d %H:%M:%S %:z").to_string())
    }
}

pub struct CurrentDateTool;

#[async_trait]
impl Tool for CurrentDateTool {
    fn name(&self) -> &str {
        "get_current_date"
    }

    fn description(&self) -> &str {
        "Get the current date"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        Ok(Local::now().date_naive().format("%Y-%m-%d").to_string())
    }
}

pub struct TimeUntilTool;

#[async_trait]
impl Tool for TimeUntilTool {
    fn name(&self) -> &str {
        "time_until"
    }

    fn description(&self) -> &str {
        "Calculate how long until a future time. Use when asked 'how long until', 'how much time until', 'when is', or similar duration questions."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::string(
                "target",
                "The target time in natural language (e.g. 'tomorrow at 10am', '3pm', '10:30am')",
            )
            .required(),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let target = args::text(args::lookup(arguments, &["target", "time"]));
        Ok(time_until(&Local::now(), &target))
    }
}

static CLOCK_TIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").ok());

/// How long from `now` until the clock time named in `target`, as
/// "2 hours and 5 minutes". A time already past today means tomorrow.
pub fn time_until<Tz: TimeZone>(now: &DateTime<Tz>, target: &str) -> String {
    let unparsed = || format!("Could not parse a time from: {target}");
    let lowered = target.trim().to_lowercase();

    let Some(caps) = CLOCK_TIME.as_ref().and_then(|re| re.captures(&lowered)) else {
        return unparsed();
    };
    let mut hour: u32 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    match caps.get(3).map(|m| m.as_str()) {
        Some("pm") if hour != 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    let Some(clock) = NaiveTime::from_hms_opt(hour, minute, 0) else {
        return unparsed();
    };

    let tomorrow = lowered.contains("tomorrow");
    let today = now.date_naive();
    let day = if tomorrow { today + Duration::days(1) } else { today };
    let Some(mut when) = now
        .timezone()
        .from_local_datetime(&day.and_time(clock))
        .earliest()
    else {
        return unparsed();
    };
    if !tomorrow && when <= *now {
        when = when + Duration::days(1);
    }

    let total = (when - now.clone()).num_seconds();
    if total < 0 {
        return "That time has already passed.".into();
    }

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let plural = |n: i64, unit: &str| format!("{n} {unit}{}", if n == 1 { "" } else { "s" });
    match (hours, minutes) {
        (h, m) if h > 0 && m > 0 => format!("{} and {}", plural(h, "hour"), plural(m, "minute")),
        (h, _) if h > 0 => plural(h, "hour"),
        (_, m) => plural(m, "minute"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn later_today() {
        assert_eq!(time_until(&at(13, 0), "3pm"), "2 hours");
        assert_eq!(time_until(&at(13, 0), "3:30 pm"), "2 hours and 30 minutes");
        assert_eq!(time_until(&at(9, 59), "10am"), "1 minute");
    }

    #[test]
    fn past_time_rolls_to_tomorrow() {
        assert_eq!(time_until(&at(18, 0), "5pm"), "23 hours");
    }

    #[test]
    fn tomorrow_keyword() {
        assert_eq!(time_until(&at(22, 0), "tomorrow at 10am"), "12 hours");
        assert_eq!(time_until(&at(9, 0), "tomorrow at 10am"), "25 hours");
    }

    #[test]
    fn midnight_and_noon() {
        assert_eq!(time_until(&at(11, 0), "12pm"), "1 hour");
        assert_eq!(time_until(&at(23, 0), "12am"), "1 hour");
    }

    #[test]
    fn unparseable_targets() {
        assert_eq!(
            time_until(&at(12, 0), "whenever"),
            "Could not parse a time from: whenever"
        );
        assert!(time_until(&at(12, 0), "99:00").starts_with("Could not parse"));
    }

    #[tokio::test]
    async fn date_tool_is_iso() {
        let out = CurrentDateTool.execute(&Map::new()).await.unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out.matches('-').count(), 2);
    }

    #[tokio::test]
    async fn time_tool_includes_offset() {
        let out = CurrentTimeTool.execute(&Map::new()).await.unwrap();
        assert!(out.contains(':'));
        assert!(out.contains('+') || out.contains('-'));
    }
}
