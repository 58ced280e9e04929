// Protocol Definition Language AST: the output of the parser, the input to
// validation and to the target emitters.

/// A fully parsed schema file. Immutable after [`crate::parser::Parser::parse`] returns;
/// [`crate::validate::ValidatedSchema::validate`] consumes it.
#[derive(Debug, Clone)]
pub struct ProtocolDefinition {
    pub namespace: Option<String>,
    pub messages: Vec<Message>,
    pub services: Vec<Service>,
    pub options: std::collections::HashMap<String, OptionValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// 1-based schema id. Wire index is `id - 1`.
    pub id: u32,
    pub ty: FieldType,
    pub repeated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    I32,
    I64,
    F32,
    F64,
    Bool,
    String,
    Bytes,
    DateTime,
    Vector3,
    /// References another message definition by name. Resolved against the
    /// symbol table during validation, not during parsing.
    StructRef(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub name: String,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub request: String,
    pub response: String,
    pub response_stream: bool,
}
