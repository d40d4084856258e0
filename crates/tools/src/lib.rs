//! Built-in tool implementations for Talkbot.
//!
//! Tools give the agent what a voice assistant needs: the clock, a
//! calculator, dice, timers and reminders, named lists, and a small
//! key/value memory of user preferences.

pub mod args;
pub mod calculator;
pub mod clock;
pub mod dice;
pub mod lists;
pub mod memory;
pub mod timers;

use std::sync::Arc;
use talkbot_core::store::DocumentStore;
use talkbot_core::tool::ToolRegistry;
use talkbot_scheduler::Scheduler;

/// Create the registry holding every built-in tool.
///
/// The registry shares the scheduler's alert slot, so
/// [`ToolRegistry::set_alert_callback`] decides how firing timers speak.
/// List and memory tools persist through `store`.
pub fn default_registry(scheduler: Scheduler, store: Arc<dyn DocumentStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::with_alert_slot(scheduler.alert_slot().clone());
    let book = lists::ListBook::new(Arc::clone(&store));

    registry.register(Box::new(clock::CurrentTimeTool));
    registry.register(Box::new(clock::CurrentDateTool));
    registry.register(Box::new(clock::TimeUntilTool));
    registry.register(Box::new(calculator::CalculatorTool));
    registry.register(Box::new(dice::RollDiceTool));
    registry.register(Box::new(dice::FlipCoinTool));
    registry.register(Box::new(dice::RandomNumberTool));
    registry.register(Box::new(timers::SetReminderTool::new(scheduler.clone())));
    registry.register(Box::new(timers::SetTimerTool::new(scheduler.clone())));
    registry.register(Box::new(timers::CancelTimerTool::new(scheduler.clone())));
    registry.register(Box::new(timers::ListTimersTool::new(scheduler)));
    registry.register(Box::new(lists::CreateListTool::new(book.clone())));
    registry.register(Box::new(lists::AddToListTool::new(book.clone())));
    registry.register(Box::new(lists::AddItemsToListTool::new(book.clone())));
    registry.register(Box::new(lists::GetListTool::new(book.clone())));
    registry.register(Box::new(lists::RemoveFromListTool::new(book.clone())));
    registry.register(Box::new(lists::ClearListTool::new(book.clone())));
    registry.register(Box::new(lists::ListAllListsTool::new(book)));
    registry.register(Box::new(memory::RememberTool::new(Arc::clone(&store))));
    registry.register(Box::new(memory::RecallTool::new(Arc::clone(&store))));
    registry.register(Box::new(memory::RecallAllTool::new(store)));
    registry
}
