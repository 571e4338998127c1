//! Change notifications.

use std::fmt;

use dotstore_core::Value;

/// A mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Set,
    Delete,
    Add,
    Subtract,
    Push,
    Unpush,
    DelByPriority,
    SetByPriority,
    DeleteAll,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::Delete => "delete",
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Push => "push",
            Operation::Unpush => "unpush",
            Operation::DelByPriority => "delByPriority",
            Operation::SetByPriority => "setByPriority",
            Operation::DeleteAll => "deleteAll",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sent after a mutating operation succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub operation: Operation,
    /// `None` for `deleteAll`.
    pub key: Option<String>,
    /// The operation's result.
    pub value: Value,
    /// Id of the session the operation ran in.
    pub session: Option<String>,
}
