use crate::{ast::*, scanner::*, SchemaError};

pub struct Parser<'src> {
    scanner: Scanner<'src>,
    current: Token,
    next: Token,
}

type PResult<T> = Result<T, SchemaError>;

impl<'src> Parser<'src> {
    pub fn new(mut scanner: Scanner<'src>) -> Self {
        let next = scanner.next();
        Parser {
            scanner,
            current: Token {
                kind: TokenKind::Eof,
                line: 0,
                column: 0,
            },
            next,
        }
    }

    pub fn parse(&mut self) -> PResult<ProtocolDefinition> {
        let mut namespace = None;
        let mut messages = Vec::new();
        let mut services = Vec::new();
        let mut options = std::collections::HashMap::new();

        loop {
            match self.peek().kind.clone() {
                TokenKind::Namespace => {
                    self.next();
                    namespace = Some(self.dotted_identifier()?);
                    self.expect(TokenKind::Semicolon, "Expected ';' after namespace")?;
                }
                TokenKind::Message => {
                    self.next();
                    messages.push(self.message()?);
                }
                TokenKind::Service => {
                    self.next();
                    services.push(self.service()?);
                }
                TokenKind::Option => {
                    self.next();
                    let (name, value) = self.option_decl()?;
                    options.insert(name, value);
                }
                TokenKind::Eof => break,
                _ => {
                    return Err(self.error(
                        "Expected 'namespace', 'message', 'service', or 'option'",
                        self.peek(),
                    ))
                }
            }
        }

        Ok(ProtocolDefinition {
            namespace,
            messages,
            services,
            options,
        })
    }

    fn dotted_identifier(&mut self) -> PResult<String> {
        self.expect_identifier("Expected identifier")
    }

    fn message(&mut self) -> PResult<Message> {
        let name = self.expect_identifier("Expected identifier after 'message'")?;
        self.expect(TokenKind::LeftBrace, "Expected '{' after message name")?;

        let mut fields = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();
        loop {
            if self.peek().kind == TokenKind::RightBrace {
                self.next();
                break;
            }
            let field = self.field_decl()?;
            if !seen_ids.insert(field.id) {
                return Err(self.error_at(
                    &format!("Duplicate field id {} in message '{}'", field.id, name),
                    self.current.line,
                    self.current.column,
                ));
            }
            fields.push(field);
        }

        Ok(Message { name, fields })
    }

    fn field_decl(&mut self) -> PResult<Field> {
        let repeated = if self.peek().kind == TokenKind::Repeated {
            self.next();
            true
        } else {
            false
        };

        if repeated && self.peek().kind == TokenKind::Repeated {
            let tok = self.next_owned();
            return Err(self.error("repeated on repeated is not permitted", &tok));
        }

        let ty = self.field_type()?;
        let name = self.expect_identifier("Expected field name")?;
        self.expect(TokenKind::Equal, "Expected '=' after field name")?;
        let id = self.expect_number("Expected field id after '='")?;
        self.expect(TokenKind::Semicolon, "Expected ';' after field declaration")?;

        let id: u32 = id.try_into().map_err(|_| {
            self.error_at("Field id out of range", self.current.line, self.current.column)
        })?;
        if id == 0 {
            return Err(self.error_at(
                "Field id must be a positive integer",
                self.current.line,
                self.current.column,
            ));
        }

        Ok(Field {
            name,
            id,
            ty,
            repeated,
        })
    }

    fn field_type(&mut self) -> PResult<FieldType> {
        let tok = self.next_owned();
        Ok(match tok.kind {
            TokenKind::Int32 => FieldType::I32,
            TokenKind::Int64 => FieldType::I64,
            TokenKind::Float => FieldType::F32,
            TokenKind::Double => FieldType::F64,
            TokenKind::Bool => FieldType::Bool,
            TokenKind::StringTy => FieldType::String,
            TokenKind::Bytes => FieldType::Bytes,
            TokenKind::DateTime => FieldType::DateTime,
            TokenKind::Vector3 => FieldType::Vector3,
            TokenKind::Identifier(name) => FieldType::StructRef(name),
            _ => return Err(self.error("Expected a field type", &tok)),
        })
    }

    fn service(&mut self) -> PResult<Service> {
        let name = self.expect_identifier("Expected identifier after 'service'")?;
        self.expect(TokenKind::LeftBrace, "Expected '{' after service name")?;

        let mut methods = Vec::new();
        loop {
            if self.peek().kind == TokenKind::RightBrace {
                self.next();
                break;
            }
            self.expect(TokenKind::Rpc, "Expected 'rpc' to begin a method declaration")?;
            methods.push(self.method()?);
        }

        if methods.is_empty() {
            return Err(self.error_at(
                &format!("Service '{name}' must declare at least one method"),
                self.current.line,
                self.current.column,
            ));
        }

        Ok(Service { name, methods })
    }

    fn method(&mut self) -> PResult<Method> {
        let name = self.expect_identifier("Expected method name after 'rpc'")?;
        self.expect(TokenKind::LeftParen, "Expected '(' after method name")?;
        let request = self.expect_identifier("Expected request message name")?;
        self.expect(TokenKind::RightParen, "Expected ')' after request type")?;
        self.expect(TokenKind::Returns, "Expected 'returns' after request type")?;
        self.expect(TokenKind::LeftParen, "Expected '(' after 'returns'")?;

        let response_stream = if self.peek().kind == TokenKind::Stream {
            self.next();
            true
        } else {
            false
        };
        let response = self.expect_identifier("Expected response message name")?;
        self.expect(TokenKind::RightParen, "Expected ')' after response type")?;
        self.expect(TokenKind::Semicolon, "Expected ';' after method declaration")?;

        Ok(Method {
            name,
            request,
            response,
            response_stream,
        })
    }

    fn option_decl(&mut self) -> PResult<(String, OptionValue)> {
        let name = self.expect_identifier("Expected identifier after 'option'")?;
        self.expect(TokenKind::Equal, "Expected '=' after option name")?;
        let tok = self.next_owned();
        let value = match tok.kind {
            TokenKind::StringLit(s) => OptionValue::Str(s),
            TokenKind::Number(n) => OptionValue::Int(n as i64),
            TokenKind::True => OptionValue::Bool(true),
            TokenKind::False => OptionValue::Bool(false),
            _ => {
                return Err(self.error(
                    "Expected string, integer, or boolean literal for option value",
                    &tok,
                ))
            }
        };
        self.expect(TokenKind::Semicolon, "Expected ';' after option declaration")?;
        Ok((name, value))
    }

    fn next(&mut self) -> &Token {
        let new_next = self.scanner.next();
        self.current = std::mem::replace(&mut self.next, new_next);
        &self.current
    }

    fn next_owned(&mut self) -> Token {
        self.next();
        std::mem::replace(
            &mut self.current,
            Token {
                kind: TokenKind::Eof,
                line: 0,
                column: 0,
            },
        )
    }

    fn peek(&self) -> &Token {
        &self.next
    }

    fn expect(&mut self, kind: TokenKind, msg: &str) -> PResult<()> {
        let tok = self.next_owned();
        if tok.kind != kind {
            return Err(self.error(msg, &tok));
        }
        Ok(())
    }

    fn expect_identifier(&mut self, msg: &str) -> PResult<String> {
        let tok = self.next_owned();
        match tok.kind {
            TokenKind::Identifier(s) => Ok(s),
            _ => Err(self.error(msg, &tok)),
        }
    }

    fn expect_number(&mut self, msg: &str) -> PResult<u64> {
        let tok = self.next_owned();
        match tok.kind {
            TokenKind::Number(n) => Ok(n),
            _ => Err(self.error(msg, &tok)),
        }
    }

    fn error(&self, msg: &str, tok: &Token) -> SchemaError {
        self.error_at(msg, tok.line, tok.column)
    }

    fn error_at(&self, msg: &str, line: usize, column: usize) -> SchemaError {
        SchemaError {
            line,
            column,
            reason: msg.to_string(),
        }
    }
}
