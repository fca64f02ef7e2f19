//! Chat commands (`!help`, `!who 42`, and whatever plugins add).

use std::collections::BTreeMap;

use worldhost_protocol::{ServerId, UserId};
use worldhost_session::User;

use crate::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("empty command")]
    Empty,

    #[error("usage: {0}")]
    Usage(String),

    #[error("{0}")]
    Failed(String),
}

/// What a command can see when it runs.
pub struct CommandContext<'a> {
    pub registry: &'a Registry,
    pub commands: &'a CommandRegistry,
    /// The user who typed the command.
    pub caller: &'a User,
    /// The instance the caller is connected to.
    pub server_id: ServerId,
}

/// A chat command.
pub trait Command: Send + Sync {
    /// One line shown by `help`.
    fn description(&self) -> &str;

    fn execute(&self, ctx: &CommandContext<'_>, args: &[&str]) -> Result<String, CommandError>;
}

/// Named commands. Names are case-insensitive.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `help` and `who` commands.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("help", Box::new(Help));
        registry.register("who", Box::new(Who));
        registry
    }

    /// Registers `command` under `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, command: Box<dyn Command>) {
        let name = name.to_lowercase();
        if self.commands.insert(name.clone(), command).is_some() {
            tracing::warn!(command = %name, "command replaced");
        } else {
            tracing::debug!(command = %name, "command registered");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_lowercase())
    }

    /// Sorted command names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Parses `line` (without the leading `!`) and runs the command.
    ///
    /// Returns the lower-cased command name and its output.
    pub fn dispatch(
        &self,
        registry: &Registry,
        caller: &User,
        server_id: ServerId,
        line: &str,
    ) -> Result<(String, String), CommandError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?.to_lowercase();
        let args: Vec<&str> = words.collect();

        let command = self
            .commands
            .get(&name)
            .ok_or_else(|| CommandError::Unknown(name.clone()))?;

        let ctx = CommandContext {
            registry,
            commands: self,
            caller,
            server_id,
        };
        let output = command.execute(&ctx, &args)?;
        Ok((name, output))
    }
}

/// Lists every registered command.
struct Help;

impl Command for Help {
    fn description(&self) -> &str {
        "list available commands"
    }

    fn execute(&self, ctx: &CommandContext<'_>, _args: &[&str]) -> Result<String, CommandError> {
        let lines: Vec<String> = ctx
            .commands
            .commands
            .iter()
            .map(|(name, cmd)| format!("!{name} - {}", cmd.description()))
            .collect();
        Ok(lines.join("\n"))
    }
}

/// Tells on which instance a user is connected.
struct Who;

impl Command for Who {
    fn description(&self) -> &str {
        "find which server a user is on"
    }

    fn execute(&self, ctx: &CommandContext<'_>, args: &[&str]) -> Result<String, CommandError> {
        let [raw] = args else {
            return Err(CommandError::Usage("!who <user-id>".into()));
        };
        let user_id = raw
            .parse()
            .map(UserId)
            .map_err(|_| CommandError::Usage("!who <user-id>".into()))?;

        let Some(user) = ctx.registry.find_user_by_id(user_id) else {
            return Ok(format!("{user_id} is not online"));
        };
        let server = ctx
            .registry
            .get(user.server_id())
            .map(|s| s.name().to_owned())
            .unwrap_or_else(|| user.server_id().to_string());
        Ok(format!("{} ({user_id}) is on {server}", user.name()))
    }
}
