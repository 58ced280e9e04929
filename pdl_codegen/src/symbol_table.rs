use std::collections::HashMap;

use crate::ast::*;
use crate::CodegenError;

/// Maps a message name to its definition so that struct-ref fields can be
/// resolved without re-scanning the whole schema.
pub struct SymbolTable {
    pub messages: HashMap<String, Message>,
}

impl SymbolTable {
    pub fn new(schema: &ProtocolDefinition) -> Self {
        let mut messages = HashMap::new();
        for message in schema.messages.iter() {
            messages.insert(message.name.clone(), message.clone());
        }
        SymbolTable { messages }
    }

    pub fn lookup(&self, name: &str) -> Result<&Message, CodegenError> {
        self.messages
            .get(name)
            .ok_or_else(|| CodegenError::UndefinedName(name.to_string()))
    }
}
