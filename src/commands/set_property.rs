//! The `SET PROPERTY` command.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult};
use ::server::PropertyValue;
use ::server::properties;

#[derive(Debug, Clone, PartialEq)]
/// A command that changes a configuration property.
pub struct SetPropertyCommand {
    /// The property's name.
    pub name: String,
    /// The new value.
    pub value: PropertyValue,
}

impl SetPropertyCommand {
    /// Creates a `SET PROPERTY` command.
    pub fn new<S: Into<String>>(name: S, value: PropertyValue) -> SetPropertyCommand {
        SetPropertyCommand {
            name: name.into(),
            value: value,
        }
    }
}

impl Command for SetPropertyCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        server.properties.set(self.name.as_str(), self.value.clone())?;

        // A few properties take effect immediately.
        if self.name == properties::PROP_PAGECACHE_SIZE {
            if let Some(size) = self.value.as_int() {
                server.storage.buffers.borrow_mut().set_max_cache_size(size as usize);
            }
        }

        let _ = writeln!(out, "Set property {} to {}.", self.name, self.value);
        Ok(None)
    }
}
