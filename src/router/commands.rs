//! Command registry: direct name → handler entries.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::error::{HandlerError, RegisterError};

/// Future returned by a command handler
pub type HandlerFuture = BoxFuture<'static, Result<Value, HandlerError>>;

/// A registered command handler.
///
/// Receives the request arguments and resolves to a JSON result or a
/// structured error. A synchronous handler just returns a ready future;
/// the router never blocks the channel on a pending one.
pub type CommandHandler = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

/// Directly registered commands, owned exclusively by one router
#[derive(Default)]
pub struct CommandRegistry {
    entries: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    /// Add a command. Fails fast on a duplicate name; a duplicate is a
    /// programming error in host setup code, never a silent overwrite.
    pub fn insert(&mut self, name: &str, handler: CommandHandler) -> Result<(), RegisterError> {
        if self.entries.contains_key(name) {
            return Err(RegisterError::DuplicateCommand {
                name: name.to_string(),
            });
        }
        self.entries.insert(name.to_string(), handler);
        Ok(())
    }

    /// Look up a handler by exact name
    pub fn resolve(&self, name: &str) -> Option<CommandHandler> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Drop all entries. Idempotent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
