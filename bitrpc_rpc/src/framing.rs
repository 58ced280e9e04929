//! On-the-wire framing for RPC requests, unary responses, and streamed
//! responses.
//!
//! A request is exactly one length-prefixed frame (§4.4.1): `[u32
//! payload_len][payload_len bytes]`, where the payload is the method name
//! (the codec's `string` encoding: `i32 len | utf-8 bytes`) immediately
//! followed by the request object's hash-tagged body -- no frame of its own
//! separates the two. Some older peers instead send a *legacy* payload shape,
//! `[u32 method_len][method_ascii][u32 req_len][req_bytes]`, which looks
//! almost identical but carries an extra length prefix in front of the
//! request bytes. The server tells them apart using the heuristic spec.md
//! §4.4.1 prescribes and accepts both; this implementation's own client only
//! ever emits the codec-string form.
//!
//! Unary responses and each item of a streamed response are themselves just
//! one length-prefixed frame of `write_object` bytes; a streamed response
//! ends with a frame of length zero.

use std::io::{self, Read, Write};

use crate::wire::{Reader, Writer};

const STREAM_MARKER: &str = "STREAM:";

#[derive(Debug)]
pub enum FramingError {
    Io(io::Error),
    /// A frame's method name was not valid UTF-8.
    InvalidMethodName,
    /// `"Service.Method"` did not contain exactly one '.'.
    MalformedMethodName(String),
    /// The legacy-form method/request length prefixes didn't fit inside the
    /// outer payload frame.
    LengthOutOfRange,
}

impl std::fmt::Display for FramingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMethodName => write!(f, "method name is not valid UTF-8"),
            Self::MalformedMethodName(s) => {
                write!(f, "method name '{s}' is not of the form 'Service.Method'")
            }
            Self::LengthOutOfRange => write!(f, "length prefix in request payload is out of range"),
        }
    }
}

impl std::error::Error for FramingError {}

impl From<io::Error> for FramingError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// A single request frame: a (possibly stream-prefixed) method name and the
/// still-hash-tagged request body (i.e. the bytes `write_object` produced).
pub struct RequestFrame {
    pub service: String,
    pub method: String,
    pub is_stream: bool,
    pub body: Vec<u8>,
}

pub fn split_method_name(name: &str) -> Result<(String, String), FramingError> {
    match name.split_once('.') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Ok((service.to_string(), method.to_string()))
        }
        _ => Err(FramingError::MalformedMethodName(name.to_string())),
    }
}

fn write_frame<S: Write>(stream: &mut S, bytes: &[u8]) -> Result<(), FramingError> {
    stream.write_all(&(bytes.len() as u32).to_le_bytes())?;
    stream.write_all(bytes)?;
    Ok(())
}

fn read_frame<S: Read>(stream: &mut S) -> Result<Vec<u8>, FramingError> {
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

/// A zero-length frame, used as the terminator of a server-streamed response.
pub fn write_stream_end<S: Write>(stream: &mut S) -> Result<(), FramingError> {
    write_frame(stream, &[])
}

/// Writes a single item of a server-streamed response, with no terminator.
/// Callers write as many of these as they like, then call
/// [`write_stream_end`] once.
pub fn write_stream_item<S: Write>(stream: &mut S, bytes: &[u8]) -> Result<(), FramingError> {
    write_frame(stream, bytes)
}

/// Builds one request payload: the method name (with the optional `STREAM:`
/// prefix) in the codec's string encoding, immediately followed by the
/// already hash-tagged request body, with no separating frame.
fn build_request_payload(service: &str, method: &str, is_stream: bool, body: &[u8]) -> Vec<u8> {
    let mut name = String::new();
    if is_stream {
        name.push_str(STREAM_MARKER);
    }
    name.push_str(service);
    name.push('.');
    name.push_str(method);

    let mut w = Writer::new();
    w.write_string(&name);
    let mut payload = w.into_vec();
    payload.extend_from_slice(body);
    payload
}

/// Writes one request frame: `[u32 payload_len][payload bytes]`, where
/// `payload` is the method name followed directly by `body` (the bytes
/// `write_object` produced for the request value).
pub fn write_request<S: Write>(
    stream: &mut S,
    service: &str,
    method: &str,
    is_stream: bool,
    body: &[u8],
) -> Result<(), FramingError> {
    let payload = build_request_payload(service, method, is_stream, body);
    write_frame(stream, &payload)
}

/// `4 + M <= payload_len` and the next `M` bytes are all printable ASCII
/// (0x20-0x7E): spec.md §4.4.1's detector for a legacy-framed payload.
fn looks_legacy(payload: &[u8]) -> Option<usize> {
    if payload.len() < 4 {
        return None;
    }
    let m = u32::from_le_bytes(payload[0..4].try_into().expect("4 bytes")) as usize;
    if 4 + m > payload.len() {
        return None;
    }
    let candidate = &payload[4..4 + m];
    if candidate.iter().all(|&b| (0x20..=0x7E).contains(&b)) {
        Some(m)
    } else {
        None
    }
}

/// Parses one request payload already read off the wire. Tries the legacy
/// ASCII shape first (per spec.md §4.4.1's detection order); falls back to
/// the codec-string shape whenever the legacy candidate isn't a fully
/// consistent legacy frame (no trailing `req_len` at all, e.g.) -- a codec-
/// string request with an empty body can otherwise look exactly like a
/// truncated legacy one, and the spec's ASCII heuristic alone can't tell
/// the two apart.
fn parse_request_payload(payload: &[u8]) -> Result<RequestFrame, FramingError> {
    let legacy = looks_legacy(payload).and_then(|m| {
        let rest = &payload[4 + m..];
        if rest.len() < 4 {
            return None;
        }
        let req_len = u32::from_le_bytes(rest[0..4].try_into().expect("4 bytes")) as usize;
        if 4 + req_len != rest.len() {
            return None;
        }
        let name = std::str::from_utf8(&payload[4..4 + m]).ok()?;
        Some((name.to_string(), rest[4..4 + req_len].to_vec()))
    });

    let (name, body) = match legacy {
        Some(parsed) => parsed,
        None => {
            let mut r = Reader::new(payload);
            let name = r.read_string().map_err(|_| FramingError::InvalidMethodName)?;
            let body = payload[payload.len() - r.remaining()..].to_vec();
            (name, body)
        }
    };

    let (is_stream, rest) = match name.strip_prefix(STREAM_MARKER) {
        Some(rest) => (true, rest),
        None => (false, name.as_str()),
    };
    let (service, method) = split_method_name(rest)?;

    Ok(RequestFrame {
        service,
        method,
        is_stream,
        body,
    })
}

/// Reads one request frame (§4.4.1): the outer `u32 payload_len` plus that
/// many payload bytes, read as a single block, then parsed as either the
/// legacy or the codec-string method-name shape.
pub fn read_request<S: Read>(stream: &mut S) -> Result<RequestFrame, FramingError> {
    let payload = read_frame(stream)?;
    parse_request_payload(&payload)
}

/// Writes a single unary response frame: `write_object(response_value)`
/// bytes, length-prefixed.
pub fn write_unary_response<S: Write>(stream: &mut S, body: &[u8]) -> Result<(), FramingError> {
    write_frame(stream, body)
}

pub fn read_unary_response<S: Read>(stream: &mut S) -> Result<Vec<u8>, FramingError> {
    read_frame(stream)
}

/// Writes every item in `items`, each as its own frame, then the zero-length
/// terminator frame.
pub fn write_stream_response<S: Write>(
    stream: &mut S,
    items: impl Iterator<Item = Vec<u8>>,
) -> Result<(), FramingError> {
    for item in items {
        write_frame(stream, &item)?;
    }
    write_stream_end(stream)
}

/// Reads the next item of a streamed response, returning `None` once the
/// zero-length terminator frame is read.
pub fn read_stream_item<S: Read>(stream: &mut S) -> Result<Option<Vec<u8>>, FramingError> {
    let frame = read_frame(stream)?;
    if frame.is_empty() {
        Ok(None)
    } else {
        Ok(Some(frame))
    }
}
