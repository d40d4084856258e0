//! Dice, coin and random-number tools.

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};
use talkbot_core::error::ToolError;
use talkbot_core::provider::ToolParameter;
use talkbot_core::tool::Tool;

use crate::args;

pub struct RollDiceTool;

#[async_trait]
impl Tool for RollDiceTool {
    fn name(&self) -> &str {
        "roll_dice"
    }

    fn description(&self) -> &str {
        "Roll dice and return the results"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::integer("sides", "Number of sides on each die").with_default(6),
            ToolParameter::integer("count", "Number of dice to roll").with_default(1),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let sides = args::integer_or(arguments.get("sides"), 6);
        let count = args::integer_or(arguments.get("count"), 1);
        let (Some(sides), Some(count)) = (sides, count) else {
            return Err(ToolError::InvalidArguments(
                "sides and count must be integers".into(),
            ));
        };
        Ok(roll(&mut rand::rng(), sides, count))
    }
}

pub const MAX_DICE: i64 = 100;
pub const MAX_SIDES: i64 = 1_000_000;

/// Roll `count` dice with `sides` faces each.
pub fn roll(rng: &mut impl Rng, sides: i64, count: i64) -> String {
    if sides < 1 || count < 1 {
        return "Error: sides and count must be at least 1".into();
    }
    if count > MAX_DICE || sides > MAX_SIDES {
        return format!("Error: at most {MAX_DICE} dice with at most {MAX_SIDES} sides each");
    }
    let rolls: Vec<i64> = (0..count).map(|_| rng.random_range(1..=sides)).collect();
    if let [single] = rolls.as_slice() {
        return format!("Rolled {single}");
    }
    // Bounded by MAX_DICE * MAX_SIDES.
    let total: i64 = rolls.iter().sum();
    format!("Rolled {count}d{sides}: {rolls:?} = {total}")
}

pub struct FlipCoinTool;

#[async_trait]
impl Tool for FlipCoinTool {
    fn name(&self) -> &str {
        "flip_coin"
    }

    fn description(&self) -> &str {
        "Flip a coin and return heads or tails"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let heads = rand::rng().random_bool(0.5);
        Ok(if heads { "Heads" } else { "Tails" }.into())
    }
}

pub struct RandomNumberTool;

#[async_trait]
impl Tool for RandomNumberTool {
    fn name(&self) -> &str {
        "random_number"
    }

    fn description(&self) -> &str {
        "Generate a random number within a range"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::integer("min_val", "Minimum value (inclusive)").with_default(1),
            ToolParameter::integer("max_val", "Maximum value (inclusive)").with_default(100),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let min = args::integer_or(args::lookup(arguments, &["min_val", "min"]), 1);
        let max = args::integer_or(args::lookup(arguments, &["max_val", "max"]), 100);
        let (Some(min), Some(max)) = (min, max) else {
            return Err(ToolError::InvalidArguments(
                "min_val and max_val must be integers".into(),
            ));
        };
        if min >= max {
            return Ok("Error: min_val must be less than max_val".into());
        }
        Ok(rand::rng().random_range(min..=max).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn single_die_reports_one_roll() {
        let out = roll(&mut StdRng::seed_from_u64(7), 6, 1);
        let n: i64 = out.strip_prefix("Rolled ").unwrap().parse().unwrap();
        assert!((1..=6).contains(&n));
    }

    #[test]
    fn several_dice_report_total() {
        let out = roll(&mut StdRng::seed_from_u64(7), 20, 3);
        assert!(out.starts_with("Rolled 3d20: ["));
        let (rolls, total) = out.split_once(" = ").unwrap();
        let rolls: Vec<i64> = rolls
            .split_once(": ")
            .unwrap()
            .1
            .trim_matches(['[', ']'])
            .split(", ")
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(rolls.len(), 3);
        assert_eq!(rolls.iter().sum::<i64>(), total.parse::<i64>().unwrap());
    }

    #[test]
    fn zero_sides_is_rejected() {
        let out = roll(&mut StdRng::seed_from_u64(1), 0, 2);
        assert_eq!(out, "Error: sides and count must be at least 1");
    }

    #[test]
    fn oversized_rolls_are_refused() {
        let mut rng = StdRng::seed_from_u64(3);
        let expected = "Error: at most 100 dice with at most 1000000 sides each";
        assert_eq!(roll(&mut rng, i64::MAX, 4), expected);
        assert_eq!(roll(&mut rng, 6, 1_000_000_000_000), expected);
        assert_eq!(roll(&mut rng, MAX_SIDES + 1, 1), expected);

        let out = roll(&mut rng, MAX_SIDES, MAX_DICE);
        assert!(out.starts_with("Rolled 100d1000000: ["));
    }

    #[tokio::test]
    async fn huge_dice_arguments_come_back_as_text() {
        let out = RollDiceTool
            .execute(&args(json!({"sides": i64::MAX, "count": 4})))
            .await
            .unwrap();
        assert!(out.starts_with("Error: at most 100 dice"));

        let out = RollDiceTool
            .execute(&args(json!({"count": 1e12})))
            .await
            .unwrap();
        assert!(out.starts_with("Error: at most 100 dice"));

        let err = RollDiceTool
            .execute(&args(json!({"count": 1e300})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn dice_defaults_to_one_d6() {
        let out = RollDiceTool.execute(&Map::new()).await.unwrap();
        assert!(out.starts_with("Rolled "));
        assert!(!out.contains(':'));
    }

    #[tokio::test]
    async fn coin_is_heads_or_tails() {
        let out = FlipCoinTool.execute(&Map::new()).await.unwrap();
        assert!(out == "Heads" || out == "Tails");
    }

    #[tokio::test]
    async fn random_number_in_range() {
        let out = RandomNumberTool
            .execute(&args(json!({"min_val": 5, "max_val": "7"})))
            .await
            .unwrap();
        let n: i64 = out.parse().unwrap();
        assert!((5..=7).contains(&n));
    }

    #[tokio::test]
    async fn random_number_rejects_empty_range() {
        let out = RandomNumberTool
            .execute(&args(json!({"min_val": 10, "max_val": 10})))
            .await
            .unwrap();
        assert_eq!(out, "Error: min_val must be less than max_val");
    }
}
