use crate::{ast::*, symbol_table::*, CodegenError};

/// A schema that has passed every check spec.md §4.1 requires before code
/// generation may run: no duplicate messages, no duplicate field ids, every
/// struct-ref and every method request/response type resolves, and no
/// message's maximum field id exceeds the 1024 ceiling.
pub struct ValidatedSchema {
    pub symbol_table: SymbolTable,
    /// Message names in declaration order, so the emitter produces output in
    /// the same order the schema was written.
    pub message_order: Vec<String>,
    pub services: Vec<Service>,
    pub namespace: Option<String>,
    pub options: std::collections::HashMap<String, OptionValue>,
}

const MAX_FIELD_ID: u32 = 1024;

impl ValidatedSchema {
    pub fn validate(schema: ProtocolDefinition) -> Result<ValidatedSchema, CodegenError> {
        let mut seen_messages = std::collections::HashSet::new();
        let mut message_order = Vec::new();
        for message in schema.messages.iter() {
            if !seen_messages.insert(message.name.clone()) {
                return Err(CodegenError::DuplicateMessage(message.name.clone()));
            }
            message_order.push(message.name.clone());
        }

        let symbol_table = SymbolTable::new(&schema);

        for message in schema.messages.iter() {
            validate_message(message, &symbol_table)?;
        }

        for service in schema.services.iter() {
            for method in service.methods.iter() {
                symbol_table.lookup(&method.request)?;
                symbol_table.lookup(&method.response)?;
            }
        }

        Ok(ValidatedSchema {
            symbol_table,
            message_order,
            services: schema.services,
            namespace: schema.namespace,
            options: schema.options,
        })
    }
}

fn validate_message(message: &Message, tab: &SymbolTable) -> Result<(), CodegenError> {
    let mut seen_ids = std::collections::HashSet::new();
    for field in message.fields.iter() {
        if !seen_ids.insert(field.id) {
            return Err(CodegenError::DuplicateFieldId(message.name.clone(), field.id));
        }
        if field.id > MAX_FIELD_ID {
            return Err(CodegenError::FieldIdTooLarge(message.name.clone(), field.id));
        }
        if let FieldType::StructRef(name) = &field.ty {
            tab.lookup(name)?;
        }
    }
    Ok(())
}
