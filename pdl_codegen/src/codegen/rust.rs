// Rust target: generates value types, their bitmask wire serialization, and
// the client/service plumbing built on top of the `bitrpc_rpc` runtime crate.

use super::{fnv1a_message_hash, mask_word_and_bit, mask_word_count, ordered_fields, CodeBuf};
use crate::ast::{Field, FieldType, Message, Method, Service};
use crate::validate::ValidatedSchema;

pub fn generate(schema: &ValidatedSchema, module_name: &str) -> String {
    let mut buf = CodeBuf::new();

    buf.add_line("// Generated by pdl_codegen. Do not edit by hand.");
    buf.add_line("#![allow(clippy::all)]");
    buf.blank();

    buf.code_block(&format!("pub mod {module_name}"), |buf| {
        buf.add_line("use bitrpc_rpc::wire::{read_object, write_object, Reader, WireError, WireMessage, Writer};");
        buf.blank();

        for name in schema.message_order.iter() {
            let message = schema
                .symbol_table
                .lookup(name)
                .expect("validated schema only names existing messages");
            message_definition(buf, message);
            message_wire_impl(buf, message);
        }

        for service in schema.services.iter() {
            service_client(buf, service);
            service_trait(buf, service);
            service_dispatcher(buf, service);
        }

        register_types(buf, schema);
    });

    buf.contents
}

/// Emits a `register_types()` that registers every message type with the
/// process-wide `bitrpc_rpc::registry` (spec.md §4.2: "registered at
/// startup, never unregistered"). Callers run this once, before accepting
/// any RPC traffic. `bitrpc_rpc::registry::register` rejects a duplicate
/// registration of the same type rather than silently accepting it, so if
/// a second schema's generated module shares a message type with this one,
/// its own `register_types()` will see that type already registered here;
/// that specific case is expected and tolerated, while any other error
/// (a genuine hash collision between distinct types) still propagates.
fn register_types(buf: &mut CodeBuf, schema: &ValidatedSchema) {
    buf.code_block("pub fn register_types() -> Result<(), bitrpc_rpc::registry::RegistryError>", |buf| {
        for name in schema.message_order.iter() {
            buf.code_block(
                &format!("match bitrpc_rpc::registry::register::<{name}>(\"{name}\")"),
                |buf| {
                    buf.add_line("Ok(()) | Err(bitrpc_rpc::registry::RegistryError::DuplicateType) => {}");
                    buf.add_line("Err(e) => return Err(e),");
                },
            );
        }
        buf.add_line("Ok(())");
    });
    buf.blank();
}

fn rust_field_type(ty: &FieldType) -> String {
    match ty {
        FieldType::I32 => "i32".to_string(),
        FieldType::I64 => "i64".to_string(),
        FieldType::F32 => "f32".to_string(),
        FieldType::F64 => "f64".to_string(),
        FieldType::Bool => "bool".to_string(),
        FieldType::String => "String".to_string(),
        FieldType::Bytes => "Vec<u8>".to_string(),
        FieldType::DateTime => "bitrpc_rpc::wire::DateTime".to_string(),
        FieldType::Vector3 => "bitrpc_rpc::wire::Vector3".to_string(),
        FieldType::StructRef(name) => name.clone(),
    }
}

fn rust_value_type(field: &Field) -> String {
    let inner = rust_field_type(&field.ty);
    if field.repeated {
        format!("Vec<{inner}>")
    } else {
        inner
    }
}

fn message_definition(buf: &mut CodeBuf, message: &Message) {
    buf.add_line("#[derive(Debug, Clone, Default, PartialEq)]");
    buf.code_block(&format!("pub struct {}", message.name), |buf| {
        for field in ordered_fields(message) {
            buf.add_line(&format!("pub {}: {},", field.name, rust_value_type(field)));
        }
    });
    buf.blank();
}

fn write_expr_for(field: &Field, accessor: &str) -> String {
    match &field.ty {
        FieldType::I32 => format!("w.write_i32({accessor})"),
        FieldType::I64 => format!("w.write_i64({accessor})"),
        FieldType::F32 => format!("w.write_f32({accessor})"),
        FieldType::F64 => format!("w.write_f64({accessor})"),
        FieldType::Bool => format!("w.write_bool({accessor})"),
        FieldType::String => format!("w.write_string({accessor})"),
        FieldType::Bytes => format!("w.write_bytes({accessor})"),
        FieldType::DateTime => format!("w.write_datetime({accessor})"),
        FieldType::Vector3 => format!("w.write_vector3({accessor})"),
        FieldType::StructRef(_) => format!("{accessor}.encode(w)"),
    }
}

fn read_expr_for(ty: &FieldType) -> String {
    match ty {
        FieldType::I32 => "r.read_i32()?".to_string(),
        FieldType::I64 => "r.read_i64()?".to_string(),
        FieldType::F32 => "r.read_f32()?".to_string(),
        FieldType::F64 => "r.read_f64()?".to_string(),
        FieldType::Bool => "r.read_bool()?".to_string(),
        FieldType::String => "r.read_string()?".to_string(),
        FieldType::Bytes => "r.read_bytes()?".to_string(),
        FieldType::DateTime => "r.read_datetime()?".to_string(),
        FieldType::Vector3 => "r.read_vector3()?".to_string(),
        FieldType::StructRef(name) => format!("{name}::decode(r)?"),
    }
}

fn message_wire_impl(buf: &mut CodeBuf, message: &Message) {
    let hash = fnv1a_message_hash(&message.name);
    buf.code_block(
        &format!("impl WireMessage for {}", message.name),
        |buf| {
            buf.add_line(&format!("const HASH_CODE: u32 = {hash}; // fnv1a(\"{}\")", message.name));
            buf.blank();

            buf.code_block("fn write_body(&self, w: &mut Writer)", |buf| {
                write_body(buf, message);
            });
            buf.blank();

            buf.code_block(
                "fn read_body(r: &mut Reader) -> Result<Self, WireError>",
                |buf| {
                    read_body(buf, message);
                },
            );
        },
    );
    buf.blank();
}

fn write_body(buf: &mut CodeBuf, message: &Message) {
    let fields = ordered_fields(message);
    let word_count = mask_word_count(message);

    for w in 0..word_count {
        buf.add_line(&format!("let mut mask{w}: u32 = 0;"));
    }
    for field in fields.iter() {
        let (word, bit) = mask_word_and_bit(field.id);
        let accessor = format!("self.{}", field.name);
        buf.code_block(
            &format!("if {accessor} != Default::default()"),
            |buf| {
                buf.add_line(&format!("mask{word} |= 1 << {bit};"));
            },
        );
    }
    for w in 0..word_count {
        buf.add_line(&format!("w.write_mask(mask{w});"));
    }
    for field in fields.iter() {
        let (word, bit) = mask_word_and_bit(field.id);
        let accessor = format!("self.{}", field.name);
        let write = if field.repeated {
            format!(
                "w.write_i32({accessor}.len() as i32); for item in {accessor}.iter() {{ {}; }}",
                write_expr_for(field, "item")
            )
        } else {
            format!("{};", write_expr_for(field, &accessor))
        };
        buf.code_block(&format!("if mask{word} & (1 << {bit}) != 0"), |buf| {
            buf.add_line(&write);
        });
    }
}

fn read_body(buf: &mut CodeBuf, message: &Message) {
    let fields = ordered_fields(message);
    let word_count = mask_word_count(message);

    for w in 0..word_count {
        buf.add_line(&format!("let mask{w} = r.read_mask()?;"));
    }
    buf.add_line("let mut value = Self::default();");
    for field in fields.iter() {
        let (word, bit) = mask_word_and_bit(field.id);
        let assign = if field.repeated {
            format!(
                "let count = r.read_i32()?; let mut items = Vec::with_capacity(count as usize); for _ in 0..count {{ items.push({}); }} value.{} = items;",
                read_expr_for(&field.ty),
                field.name
            )
        } else {
            format!("value.{} = {};", field.name, read_expr_for(&field.ty))
        };
        buf.code_block(&format!("if mask{word} & (1 << {bit}) != 0"), |buf| {
            buf.add_line(&assign);
        });
    }
    buf.add_line("Ok(value)");
}

fn method_ident(method: &Method) -> String {
    to_snake_case(&method.name)
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

fn service_client(buf: &mut CodeBuf, service: &Service) {
    let client_name = format!("{}Client", service.name);
    buf.code_block(&format!("pub struct {client_name}"), |buf| {
        buf.add_line("conn: bitrpc_rpc::client::Connection,");
    });
    buf.blank();

    buf.code_block(&format!("impl {client_name}"), |buf| {
        buf.code_block(
            "pub fn connect<A: std::net::ToSocketAddrs>(addr: A) -> std::io::Result<Self>",
            |buf| {
                buf.add_line(&format!(
                    "Ok({client_name} {{ conn: bitrpc_rpc::client::Connection::connect(addr)? }})"
                ));
            },
        );
        buf.blank();

        for method in service.methods.iter() {
            let ident = method_ident(method);
            if method.response_stream {
                buf.code_block(
                    &format!(
                        "pub fn {ident}(&mut self, req: &{}) -> Result<bitrpc_rpc::client::StreamCall<{}>, bitrpc_rpc::client::CallError>",
                        method.request, method.response
                    ),
                    |buf| {
                        buf.add_line(&format!(
                            "self.conn.call_stream(\"{}.{}\", req)",
                            service.name, method.name
                        ));
                    },
                );
            } else {
                buf.code_block(
                    &format!(
                        "pub fn {ident}(&mut self, req: &{}) -> Result<{}, bitrpc_rpc::client::CallError>",
                        method.request, method.response
                    ),
                    |buf| {
                        buf.add_line(&format!(
                            "self.conn.call_unary(\"{}.{}\", req)",
                            service.name, method.name
                        ));
                    },
                );
            }
            buf.blank();
        }
    });
    buf.blank();
}

fn service_trait(buf: &mut CodeBuf, service: &Service) {
    let trait_name = service.name.to_string();
    buf.code_block(&format!("pub trait {trait_name}: Send + Sync"), |buf| {
        for method in service.methods.iter() {
            let ident = method_ident(method);
            if method.response_stream {
                buf.add_line(&format!(
                    "fn {ident}(&self, req: {}, emit: &mut dyn FnMut(&{})) -> Result<(), bitrpc_rpc::server::HandlerError>;",
                    method.request, method.response
                ));
            } else {
                buf.add_line(&format!(
                    "fn {ident}(&self, req: {}) -> Result<{}, bitrpc_rpc::server::HandlerError>;",
                    method.request, method.response
                ));
            }
        }
    });
    buf.blank();
}

fn service_dispatcher(buf: &mut CodeBuf, service: &Service) {
    let dispatcher_name = format!("{}Dispatcher", service.name);
    let trait_name = &service.name;

    buf.code_block(&format!("pub struct {dispatcher_name}<T>"), |buf| {
        buf.add_line("pub inner: T,");
    });
    buf.blank();

    buf.code_block(
        &format!("impl<T: {trait_name}> bitrpc_rpc::server::Dispatch for {dispatcher_name}<T>"),
        |buf| {
            buf.code_block("fn service_name(&self) -> &'static str", |buf| {
                buf.add_line(&format!("\"{}\"", service.name));
            });
            buf.blank();

            buf.code_block(
                "fn call(&self, method: &str, body: &[u8], respond: &mut dyn bitrpc_rpc::server::Responder) -> Result<(), bitrpc_rpc::server::HandlerError>",
                |buf| {
                    buf.code_block("match method", |buf| {
                        for method in service.methods.iter() {
                            let ident = method_ident(method);
                            buf.code_block(&format!("\"{}\" =>", method.name), |buf| {
                                buf.add_line("let mut reader = Reader::new(body);");
                                buf.add_line(&format!(
                                    "let req = read_object::<{}>(&mut reader)?;",
                                    method.request
                                ));
                                if method.response_stream {
                                    buf.add_line(&format!(
                                        "self.inner.{ident}(req, &mut |item: &{}| {{",
                                        method.response
                                    ));
                                    buf.indent();
                                    buf.add_line("let mut w = Writer::new();");
                                    buf.add_line("write_object(&mut w, item);");
                                    buf.add_line("respond.stream_item(w.into_vec());");
                                    buf.outdent();
                                    buf.add_line("})?;");
                                    buf.add_line("respond.stream_end();");
                                } else {
                                    buf.add_line(&format!("let resp = self.inner.{ident}(req)?;"));
                                    buf.add_line("let mut w = Writer::new();");
                                    buf.add_line("write_object(&mut w, &resp);");
                                    buf.add_line("respond.unary(w.into_vec());");
                                }
                                buf.add_line("Ok(())");
                            });
                        }
                        buf.add_line("other => Err(bitrpc_rpc::server::HandlerError::UnknownMethod(other.to_string())),");
                    });
                },
            );
        },
    );
    buf.blank();
}
