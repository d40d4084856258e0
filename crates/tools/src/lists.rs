//! Named lists ("shopping", "todo", ...) kept in the `lists` document.
//!
//! The document maps list name to an array of item strings. Whatever is on
//! disk is normalised on load, so a hand-edited or half-written file never
//! makes a tool fail.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use talkbot_core::error::ToolError;
use talkbot_core::provider::ToolParameter;
use talkbot_core::store::{Document, DocumentStore};
use talkbot_core::tool::Tool;

use crate::args;

const STORE: &str = "lists";
const DEFAULT_LIST: &str = "shopping";

/// The list name argument, defaulting to the shopping list.
fn list_name(arguments: &Map<String, Value>) -> String {
    args::text_or(args::lookup(arguments, &["list_name", "list"]), DEFAULT_LIST)
}

fn normalize(document: Document) -> Vec<(String, Vec<String>)> {
    document
        .into_iter()
        .filter_map(|(name, raw)| {
            let name = name.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let items: Vec<String> = match raw {
                Value::Array(values) => values.iter().map(|v| args::text(Some(v))).collect(),
                Value::Null => Vec::new(),
                other => vec![args::text(Some(&other))],
            };
            Some((name, items.into_iter().filter(|i| !i.is_empty()).collect()))
        })
        .collect()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Shared access to the lists document for every list tool.
#[derive(Clone)]
pub struct ListBook {
    store: Arc<dyn DocumentStore>,
}

impl ListBook {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn load(&self, tool: &str) -> Result<Vec<(String, Vec<String>)>, ToolError> {
        let document = self
            .store
            .load(STORE)
            .await
            .map_err(|e| ToolError::execution(tool, e))?;
        Ok(normalize(document))
    }

    async fn save(&self, tool: &str, lists: Vec<(String, Vec<String>)>) -> Result<(), ToolError> {
        let document: Document = lists
            .into_iter()
            .map(|(name, items)| (name, Value::from(items)))
            .collect();
        self.store
            .save(STORE, &document)
            .await
            .map_err(|e| ToolError::execution(tool, e))
    }

    async fn items(&self, tool: &str, name: &str) -> Result<Vec<String>, ToolError> {
        Ok(self
            .load(tool)
            .await?
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, items)| items)
            .unwrap_or_default())
    }

    /// Load, let `edit` change one list (created empty if missing), save.
    async fn update<T: Send>(
        &self,
        tool: &str,
        name: &str,
        edit: impl FnOnce(&mut Vec<String>) -> T + Send,
    ) -> Result<T, ToolError> {
        let mut lists = self.load(tool).await?;
        let pos = match lists.iter().position(|(n, _)| n == name) {
            Some(pos) => pos,
            None => {
                lists.push((name.to_string(), Vec::new()));
                lists.len() - 1
            }
        };
        let out = edit(&mut lists[pos].1);
        self.save(tool, lists).await?;
        Ok(out)
    }
}

macro_rules! list_tool {
    ($ty:ident) => {
        pub struct $ty {
            book: ListBook,
        }

        impl $ty {
            pub fn new(book: ListBook) -> Self {
                Self { book }
            }
        }
    };
}

list_tool!(CreateListTool);
list_tool!(AddToListTool);
list_tool!(AddItemsToListTool);
list_tool!(GetListTool);
list_tool!(RemoveFromListTool);
list_tool!(ClearListTool);
list_tool!(ListAllListsTool);

fn list_name_param(description: &str) -> ToolParameter {
    ToolParameter::string("list_name", description).with_default(DEFAULT_LIST)
}

#[async_trait]
impl Tool for CreateListTool {
    fn name(&self) -> &str {
        "create_list"
    }

    fn description(&self) -> &str {
        "Create a new empty named list. Use when the user says 'create a [name] list' or 'start a [name] list' without specifying items to add."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::string(
                "list_name",
                "The name of the list to create (e.g., 'shopping', 'todo', 'groceries')",
            )
            .required(),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let name = args::text(args::lookup(arguments, &["list_name", "list", "name"]));
        if name.is_empty() {
            return Ok("Error: list_name must not be empty.".into());
        }

        let existing = self.book.items(self.name(), &name).await?;
        if !existing.is_empty() {
            return Ok(format!(
                "The {name} list already exists with {} item(s).",
                existing.len()
            ));
        }
        self.book.update(self.name(), &name, Vec::clear).await?;
        Ok(format!("Created '{name}' list."))
    }
}

#[async_trait]
impl Tool for AddToListTool {
    fn name(&self) -> &str {
        "add_to_list"
    }

    fn description(&self) -> &str {
        "Add an item to a named list (default: shopping list)"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::string("item", "The item to add").required(),
            list_name_param("Which list to add to"),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let name = list_name(arguments);
        let item = args::text(arguments.get("item"));
        if item.is_empty() {
            return Ok("Error: item must not be empty.".into());
        }

        let added = self
            .book
            .update(self.name(), &name, |items| {
                if items.contains(&item) {
                    false
                } else {
                    items.push(item.clone());
                    true
                }
            })
            .await?;
        Ok(if added {
            format!("Added '{item}' to the {name} list.")
        } else {
            format!("'{item}' is already on the {name} list.")
        })
    }
}

#[async_trait]
impl Tool for AddItemsToListTool {
    fn name(&self) -> &str {
        "add_items_to_list"
    }

    fn description(&self) -> &str {
        "Add multiple items to a named list at once. Use when the user names more than one item. REQUIRED: items must always be provided as an array of strings."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::string_array(
                "items",
                "Items to add. REQUIRED, must be a non-empty array (e.g. [\"lettuce\", \"tomato\", \"onion\"])",
            )
            .required(),
            list_name_param("Which list to add to"),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let name = list_name(arguments);
        let Some(wanted) = arguments.get("items").and_then(args::items) else {
            return Ok("Error: items must be a list of values.".into());
        };

        let (added, skipped) = self
            .book
            .update(self.name(), &name, |items| {
                let (mut added, mut skipped) = (Vec::new(), Vec::new());
                for item in wanted {
                    if items.contains(&item) {
                        skipped.push(item);
                    } else {
                        items.push(item.clone());
                        added.push(item);
                    }
                }
                (added, skipped)
            })
            .await?;

        let mut parts = Vec::new();
        if !added.is_empty() {
            parts.push(format!("Added {} to the {name} list.", added.join(", ")));
        }
        if !skipped.is_empty() {
            parts.push(format!("Already had: {}.", skipped.join(", ")));
        }
        Ok(if parts.is_empty() {
            format!("No items added to {name} list.")
        } else {
            parts.join(" ")
        })
    }
}

#[async_trait]
impl Tool for GetListTool {
    fn name(&self) -> &str {
        "get_list"
    }

    fn description(&self) -> &str {
        "Get all items on a named list (default: shopping list)"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![list_name_param("Which list to retrieve")]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let name = list_name(arguments);
        let items = self.book.items(self.name(), &name).await?;
        if items.is_empty() {
            return Ok(format!("The {name} list is empty."));
        }
        let lines: Vec<String> = items.iter().map(|i| format!("- {i}")).collect();
        Ok(format!("{} list:\n{}", capitalize(&name), lines.join("\n")))
    }
}

#[async_trait]
impl Tool for RemoveFromListTool {
    fn name(&self) -> &str {
        "remove_from_list"
    }

    fn description(&self) -> &str {
        "Remove an item from a named list (default: shopping list)"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::string("item", "The item to remove").required(),
            list_name_param("Which list to remove from"),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let name = list_name(arguments);
        let item = args::text(arguments.get("item"));
        if item.is_empty() {
            return Ok("Error: item must not be empty.".into());
        }

        let wanted = item.to_lowercase();
        let items = self.book.items(self.name(), &name).await?;
        let Some(matched) = items.iter().find(|i| i.to_lowercase() == wanted).cloned() else {
            return Ok(format!("'{item}' was not found on the {name} list."));
        };

        self.book
            .update(self.name(), &name, |items| {
                items.retain(|i| i.to_lowercase() != wanted);
            })
            .await?;
        Ok(format!("Removed '{matched}' from the {name} list."))
    }
}

#[async_trait]
impl Tool for ClearListTool {
    fn name(&self) -> &str {
        "clear_list"
    }

    fn description(&self) -> &str {
        "Clear all items from a named list (default: shopping list)"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![list_name_param("Which list to clear")]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let name = list_name(arguments);
        self.book.update(self.name(), &name, Vec::clear).await?;
        Ok(format!("Cleared the {name} list."))
    }
}

#[async_trait]
impl Tool for ListAllListsTool {
    fn name(&self) -> &str {
        "list_all_lists"
    }

    fn description(&self) -> &str {
        "Show all named lists and their contents"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let lists = self.book.load(self.name()).await?;
        if lists.is_empty() {
            return Ok("No lists found.".into());
        }
        Ok(lists
            .iter()
            .map(|(name, items)| {
                if items.is_empty() {
                    format!("{name}: (empty)")
                } else {
                    let quoted: Vec<String> = items.iter().map(|i| format!("\"{i}\"")).collect();
                    format!("{name}: [{}]", quoted.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
