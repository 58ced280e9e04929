// C# target: a second language sharing the same bitmask wire layout as the
// Rust target, so a generated C# client can talk to a Rust-hosted service
// (or vice versa) without either side knowing the other's implementation.

use super::{fnv1a_message_hash, mask_word_and_bit, mask_word_count, ordered_fields, CodeBuf};
use crate::ast::{Field, FieldType, Message, Service};
use crate::validate::ValidatedSchema;

pub fn generate(schema: &ValidatedSchema, module_name: &str) -> String {
    let mut buf = CodeBuf::new();

    let namespace = schema
        .namespace
        .clone()
        .unwrap_or_else(|| "BitRpc.Generated".to_string());

    buf.add_line("// Generated by pdl_codegen. Do not edit by hand.");
    buf.add_line("using System;");
    buf.add_line("using System.Collections.Generic;");
    buf.add_line("using BitRpc.Runtime;");
    buf.blank();

    buf.code_block(&format!("namespace {namespace}"), |buf| {
        for name in schema.message_order.iter() {
            let message = schema
                .symbol_table
                .lookup(name)
                .expect("validated schema only names existing messages");
            message_class(buf, message);
        }

        for service in schema.services.iter() {
            service_client(buf, service);
            service_interface(buf, service);
            service_dispatcher(buf, service);
        }
    });

    let _ = module_name;
    buf.contents
}

fn csharp_field_type(ty: &FieldType) -> String {
    match ty {
        FieldType::I32 => "int".to_string(),
        FieldType::I64 => "long".to_string(),
        FieldType::F32 => "float".to_string(),
        FieldType::F64 => "double".to_string(),
        FieldType::Bool => "bool".to_string(),
        FieldType::String => "string".to_string(),
        FieldType::Bytes => "byte[]".to_string(),
        FieldType::DateTime => "DateTime".to_string(),
        FieldType::Vector3 => "Vector3".to_string(),
        FieldType::StructRef(name) => name.clone(),
    }
}

fn csharp_value_type(field: &Field) -> String {
    let inner = csharp_field_type(&field.ty);
    if field.repeated {
        format!("List<{inner}>")
    } else {
        inner
    }
}

fn csharp_default_expr(field: &Field) -> String {
    if field.repeated {
        return format!("new List<{}>()", csharp_field_type(&field.ty));
    }
    match &field.ty {
        FieldType::I32 => "0".to_string(),
        FieldType::I64 => "0L".to_string(),
        FieldType::F32 => "0f".to_string(),
        FieldType::F64 => "0d".to_string(),
        FieldType::Bool => "false".to_string(),
        FieldType::String => "string.Empty".to_string(),
        FieldType::Bytes => "Array.Empty<byte>()".to_string(),
        FieldType::DateTime => "default(DateTime)".to_string(),
        FieldType::Vector3 => "default(Vector3)".to_string(),
        FieldType::StructRef(name) => format!("new {name}()"),
    }
}

/// Presence-bit predicate for one field. `byte[]` and message types are
/// reference types in C#, so comparing them against a freshly constructed
/// default with `==` would test identity, not value -- `Bytes` checks
/// `Length` and struct-ref fields recurse into the other message's own
/// `IsDefault()` instead.
fn field_is_default_expr(field: &Field) -> String {
    let accessor = pascal_case(&field.name);
    if field.repeated {
        return format!("{accessor}.Count == 0");
    }
    match &field.ty {
        FieldType::Bytes => format!("{accessor}.Length == 0"),
        FieldType::StructRef(_) => format!("{accessor}.IsDefault()"),
        _ => format!("{accessor} == {}", csharp_default_expr(field)),
    }
}

fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn write_call_for(field: &Field, accessor: &str) -> String {
    match &field.ty {
        FieldType::I32 => format!("w.WriteInt32({accessor});"),
        FieldType::I64 => format!("w.WriteInt64({accessor});"),
        FieldType::F32 => format!("w.WriteFloat({accessor});"),
        FieldType::F64 => format!("w.WriteDouble({accessor});"),
        FieldType::Bool => format!("w.WriteBool({accessor});"),
        FieldType::String => format!("w.WriteString({accessor});"),
        FieldType::Bytes => format!("w.WriteBytes({accessor});"),
        FieldType::DateTime => format!("w.WriteDateTime({accessor});"),
        FieldType::Vector3 => format!("w.WriteVector3({accessor});"),
        FieldType::StructRef(_) => format!("{accessor}.Encode(w);"),
    }
}

fn read_expr_for(ty: &FieldType) -> String {
    match ty {
        FieldType::I32 => "r.ReadInt32()".to_string(),
        FieldType::I64 => "r.ReadInt64()".to_string(),
        FieldType::F32 => "r.ReadFloat()".to_string(),
        FieldType::F64 => "r.ReadDouble()".to_string(),
        FieldType::Bool => "r.ReadBool()".to_string(),
        FieldType::String => "r.ReadString()".to_string(),
        FieldType::Bytes => "r.ReadBytes()".to_string(),
        FieldType::DateTime => "r.ReadDateTime()".to_string(),
        FieldType::Vector3 => "r.ReadVector3()".to_string(),
        FieldType::StructRef(name) => format!("{name}.Decode(r)"),
    }
}

fn message_class(buf: &mut CodeBuf, message: &Message) {
    let hash = fnv1a_message_hash(&message.name);
    let fields = ordered_fields(message);
    let word_count = mask_word_count(message);

    buf.code_block(
        &format!("public sealed class {} : IWireMessage<{}>", message.name, message.name),
        |buf| {
            buf.add_line(&format!("public const uint HashCode = {hash}; // fnv1a(\"{}\")", message.name));
            buf.blank();

            for field in fields.iter() {
                buf.add_line(&format!(
                    "public {} {} = {};",
                    csharp_value_type(field),
                    pascal_case(&field.name),
                    csharp_default_expr(field)
                ));
            }
            buf.blank();

            buf.add_line("public uint GetHashCode32() => HashCode;");
            buf.blank();

            // IsDefault() recurses into struct-ref fields instead of relying
            // on `==`: message classes are reference types, so the default
            // `==` would compare identity rather than the per-field equality
            // spec.md section 4.3.4 requires.
            buf.code_block("public bool IsDefault()", |buf| {
                if fields.is_empty() {
                    buf.add_line("return true;");
                } else {
                    let checks: Vec<String> = fields
                        .iter()
                        .map(|field| field_is_default_expr(field))
                        .collect();
                    buf.add_line(&format!("return {};", checks.join(" && ")));
                }
            });
            buf.blank();

            // Bare body encoding, no hash tag and no length prefix -- used
            // directly for struct-ref fields nested inside another message,
            // where the schema already pins the field's type. The RPC
            // envelope tag is added separately, only at the request/response
            // boundary (see the generated dispatcher).
            buf.code_block("public void Encode(BitWriter w)", |buf| {
                buf.add_line("WriteBody(w);");
            });
            buf.blank();

            buf.code_block("public void WriteBody(BitWriter w)", |buf| {
                for wi in 0..word_count {
                    buf.add_line(&format!("uint mask{wi} = 0;"));
                }
                for field in fields.iter() {
                    let (word, bit) = mask_word_and_bit(field.id);
                    let is_default = field_is_default_expr(field);
                    buf.code_block(&format!("if (!({is_default}))"), |buf| {
                        buf.add_line(&format!("mask{word} |= 1u << {bit};"));
                    });
                }
                for wi in 0..word_count {
                    buf.add_line(&format!("w.WriteMask(mask{wi});"));
                }
                for field in fields.iter() {
                    let (word, bit) = mask_word_and_bit(field.id);
                    let accessor = pascal_case(&field.name);
                    buf.code_block(&format!("if ((mask{word} & (1u << {bit})) != 0)"), |buf| {
                        if field.repeated {
                            buf.add_line(&format!("w.WriteInt32({accessor}.Count);"));
                            buf.code_block(&format!("foreach (var item in {accessor})"), |buf| {
                                buf.add_line(&write_call_for(field, "item"));
                            });
                        } else {
                            buf.add_line(&write_call_for(field, &accessor));
                        }
                    });
                }
            });
            buf.blank();

            buf.code_block(
                &format!("public static {} Decode(BitReader r)", message.name),
                |buf| {
                    buf.add_line("return ReadBody(r);");
                },
            );
            buf.blank();

            buf.code_block(
                &format!("public static {} ReadBody(BitReader r)", message.name),
                |buf| {
                    for wi in 0..word_count {
                        buf.add_line(&format!("uint mask{wi} = r.ReadMask();"));
                    }
                    buf.add_line(&format!("var value = new {}();", message.name));
                    for field in fields.iter() {
                        let (word, bit) = mask_word_and_bit(field.id);
                        let accessor = pascal_case(&field.name);
                        buf.code_block(&format!("if ((mask{word} & (1u << {bit})) != 0)"), |buf| {
                            if field.repeated {
                                buf.add_line("int count = r.ReadInt32();");
                                buf.add_line(&format!(
                                    "value.{accessor} = new List<{}>(count);",
                                    csharp_field_type(&field.ty)
                                ));
                                buf.code_block("for (int i = 0; i < count; i++)", |buf| {
                                    buf.add_line(&format!(
                                        "value.{accessor}.Add({});",
                                        read_expr_for(&field.ty)
                                    ));
                                });
                            } else {
                                buf.add_line(&format!("value.{accessor} = {};", read_expr_for(&field.ty)));
                            }
                        });
                    }
                    buf.add_line("return value;");
                },
            );
        },
    );
    buf.blank();
}

fn service_client(buf: &mut CodeBuf, service: &Service) {
    let client_name = format!("{}Client", service.name);
    buf.code_block(&format!("public sealed class {client_name}"), |buf| {
        buf.add_line("private readonly RpcConnection conn;");
        buf.blank();
        buf.code_block(&format!("public {client_name}(RpcConnection conn)"), |buf| {
            buf.add_line("this.conn = conn;");
        });
        buf.blank();

        for method in service.methods.iter() {
            let name = pascal_case(&method.name);
            if method.response_stream {
                buf.code_block(
                    &format!(
                        "public StreamCall<{}> {name}({} req)",
                        method.response, method.request
                    ),
                    |buf| {
                        buf.add_line(&format!(
                            "return conn.CallStream<{}, {}>(\"{}.{}\", req);",
                            method.request, method.response, service.name, method.name
                        ));
                    },
                );
            } else {
                buf.code_block(
                    &format!("public {} {name}({} req)", method.response, method.request),
                    |buf| {
                        buf.add_line(&format!(
                            "return conn.CallUnary<{}, {}>(\"{}.{}\", req);",
                            method.request, method.response, service.name, method.name
                        ));
                    },
                );
            }
            buf.blank();
        }
    });
    buf.blank();
}

fn service_interface(buf: &mut CodeBuf, service: &Service) {
    buf.code_block(&format!("public interface I{}", service.name), |buf| {
        for method in service.methods.iter() {
            let name = pascal_case(&method.name);
            if method.response_stream {
                buf.add_line(&format!(
                    "void {name}({} req, Action<{}> emit);",
                    method.request, method.response
                ));
            } else {
                buf.add_line(&format!("{} {name}({} req);", method.response, method.request));
            }
        }
    });
    buf.blank();
}

fn service_dispatcher(buf: &mut CodeBuf, service: &Service) {
    let dispatcher_name = format!("{}Dispatcher", service.name);
    buf.code_block(
        &format!("public sealed class {dispatcher_name} : IServiceDispatcher"),
        |buf| {
            buf.add_line(&format!("private readonly I{} inner;", service.name));
            buf.blank();
            buf.code_block(&format!("public {dispatcher_name}(I{} inner)", service.name), |buf| {
                buf.add_line("this.inner = inner;");
            });
            buf.blank();
            buf.add_line(&format!("public string ServiceName => \"{}\";", service.name));
            buf.blank();

            buf.code_block(
                "public void Call(string method, byte[] body, IResponder respond)",
                |buf| {
                    buf.code_block("switch (method)", |buf| {
                        for method in service.methods.iter() {
                            let name = pascal_case(&method.name);
                            buf.code_block(&format!("case \"{}\":", method.name), |buf| {
                                // The request body arrives as a tagged object (hash
                                // code + bare body) -- this is the one place on the
                                // server side where that tag is actually checked.
                                buf.add_line("var r = new BitReader(body);");
                                buf.add_line("uint reqHash = r.ReadUInt32();");
                                buf.code_block(
                                    &format!("if (reqHash != {}.HashCode)", method.request),
                                    |buf| {
                                        buf.add_line(&format!(
                                            "throw new WireDecodeException(\"hash code mismatch decoding {}\");",
                                            method.request
                                        ));
                                    },
                                );
                                buf.add_line(&format!("var req = {}.ReadBody(r);", method.request));
                                if method.response_stream {
                                    buf.code_block(
                                        &format!("inner.{name}(req, item =>"),
                                        |buf| {
                                            buf.add_line("var w = new BitWriter();");
                                            buf.add_line(&format!("w.WriteUInt32({}.HashCode);", method.response));
                                            buf.add_line("item.WriteBody(w);");
                                            buf.add_line("respond.StreamItem(w.ToArray());");
                                        },
                                    );
                                    buf.add_line(");");
                                    buf.add_line("respond.StreamEnd();");
                                } else {
                                    buf.add_line(&format!("var resp = inner.{name}(req);"));
                                    buf.add_line("var w = new BitWriter();");
                                    buf.add_line(&format!("w.WriteUInt32({}.HashCode);", method.response));
                                    buf.add_line("resp.WriteBody(w);");
                                    buf.add_line("respond.Unary(w.ToArray());");
                                }
                                buf.add_line("break;");
                            });
                        }
                        buf.code_block("default:", |buf| {
                            buf.add_line("throw new UnknownMethodException(method);");
                        });
                    });
                },
            );
        },
    );
    buf.blank();
}

#[cfg(test)]
mod tests {
    use super::generate;
    use crate::parser::Parser;
    use crate::scanner::Scanner;
    use crate::validate::ValidatedSchema;

    fn generate_src(src: &str) -> String {
        let schema = Parser::new(Scanner::new(src)).parse().unwrap();
        let validated = ValidatedSchema::validate(schema).unwrap();
        generate(&validated, "generated")
    }

    #[test]
    fn message_encode_decode_are_bare_body_passthroughs() {
        let out = generate_src("message Ping { int32 n = 1; }");
        assert!(out.contains("public void Encode(BitWriter w)"));
        assert!(out.contains("WriteBody(w);"));
        assert!(out.contains("public static Ping Decode(BitReader r)"));
        assert!(out.contains("return ReadBody(r);"));
        assert!(!out.contains("WriteFramed"));
        assert!(!out.contains("ReadFramed"));
    }

    #[test]
    fn dispatcher_tags_the_request_and_response_at_the_rpc_boundary() {
        let out = generate_src(
            "message Req { int32 n = 1; } message Resp { int32 n = 1; } \
             service Demo { rpc Echo(Req) returns (Resp); }",
        );
        assert!(out.contains("r.ReadUInt32()"));
        assert!(out.contains("if (reqHash != Req.HashCode)"));
        assert!(out.contains("Req.ReadBody(r)"));
        assert!(out.contains("w.WriteUInt32(Resp.HashCode);"));
        assert!(out.contains("resp.WriteBody(w);"));
    }

    #[test]
    fn struct_ref_fields_use_bare_encode_not_the_tagged_envelope() {
        let out = generate_src("message Inner { int32 x = 1; } message Outer { Inner i = 1; }");
        assert!(out.contains("I.Encode(w);"));
        assert!(out.contains("Inner.Decode(r)"));
    }

    #[test]
    fn struct_ref_default_detection_recurses_instead_of_using_reference_equality() {
        let out = generate_src("message Inner { int32 x = 1; } message Outer { Inner i = 1; }");
        assert!(out.contains("public bool IsDefault()"));
        assert!(out.contains("if (!(I.IsDefault()))"));
        assert!(!out.contains("I == new Inner()"));
    }

    #[test]
    fn bytes_default_detection_checks_length_not_reference_equality() {
        let out = generate_src("message Blob { bytes data = 1; }");
        assert!(out.contains("if (!(Data.Length == 0))"));
        assert!(!out.contains("Data == Array.Empty<byte>()"));
    }
}
