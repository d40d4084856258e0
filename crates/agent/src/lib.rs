//! The orchestration loop: the heart of Talkbot.
//!
//! One user turn runs as a bounded **request → extract → execute → append**
//! cycle:
//!
//! 1. **Send** the conversation plus the tool schema list to the backend
//! 2. **Extract** tool calls from the reply, whatever encoding the backend used
//! 3. **If calls**: execute them in order, append one tool message per call,
//!    loop back to step 1
//! 4. **If plain text**: append it and return it
//!
//! The loop stops with [`talkbot_core::Error::MaxIterationsExceeded`] after
//! the configured number of round-trips without a final answer.

pub mod extract;
pub mod loop_runner;

pub use extract::{CallFormat, ExtractedCall, Extraction, extract, strip_thinking};
pub use loop_runner::{AgentLoop, CALL_FORMAT_KEY};
