//! Blocking TCP client: one [`Connection`] per server, used to make unary and
//! server-streamed calls. Generated per-service `*Client` stubs are thin
//! wrappers over this.
//!
//! The blocking API above is the hot path. [`call_unary_async`] is a thin
//! wrapper around it for callers that don't want to block the calling
//! thread: it moves the `Connection` onto a dedicated worker thread, makes
//! the call there, and hands the caller back an [`AsyncCall`] holding the
//! receiving half of an `mpsc` channel. There's no executor or event loop
//! here, just a channel -- a connection only ever has one call in flight at
//! a time, so a single worker thread per outstanding call is all pooling
//! this needs.

use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc;

use crate::framing::{self, FramingError};
use crate::wire::{read_object, write_object, Reader, WireError, WireMessage, Writer};

#[derive(Debug)]
pub enum CallError {
    Io(std::io::Error),
    Framing(FramingError),
    Wire(WireError),
    /// The connection was closed (cleanly or otherwise) before a complete
    /// response was received.
    ConnectionClosed,
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Framing(e) => write!(f, "framing error: {e}"),
            Self::Wire(e) => write!(f, "wire codec error: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed before response completed"),
        }
    }
}

impl std::error::Error for CallError {}

impl From<std::io::Error> for CallError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(e)
        }
    }
}

impl From<FramingError> for CallError {
    fn from(e: FramingError) -> Self {
        match e {
            FramingError::Io(e) => Self::from(e),
            other => Self::Framing(other),
        }
    }
}

impl From<WireError> for CallError {
    fn from(e: WireError) -> Self {
        Self::Wire(e)
    }
}

pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Connection {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: TcpStream) -> std::io::Result<Self> {
        Ok(Connection {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    pub fn call_unary<Req: WireMessage, Resp: WireMessage>(
        &mut self,
        method: &str,
        req: &Req,
    ) -> Result<Resp, CallError> {
        let (service, method) = framing::split_method_name(method)?;

        let mut w = Writer::new();
        write_object(&mut w, req);
        let body = w.into_vec();

        framing::write_request(&mut self.writer, &service, &method, false, &body)?;
        self.writer.flush()?;

        let response = framing::read_unary_response(&mut self.reader)?;
        let mut r = Reader::new(&response);
        Ok(read_object::<Resp>(&mut r)?)
    }

    pub fn call_stream<Req: WireMessage, Resp: WireMessage>(
        &mut self,
        method: &str,
        req: &Req,
    ) -> Result<StreamCall<'_, Resp>, CallError> {
        let (service, method) = framing::split_method_name(method)?;

        let mut w = Writer::new();
        write_object(&mut w, req);
        let body = w.into_vec();

        framing::write_request(&mut self.writer, &service, &method, true, &body)?;
        self.writer.flush()?;

        Ok(StreamCall {
            reader: &mut self.reader,
            finished: false,
            error: None,
            _marker: std::marker::PhantomData,
        })
    }
}

/// The result of an [`call_unary_async`] call: the `Connection` is handed
/// back alongside the response (or error) so the caller can reuse it for a
/// follow-up call once this one lands.
pub type AsyncCallResult<Resp> = (Connection, Result<Resp, CallError>);

/// A pending unary call running on a worker thread. Call [`AsyncCall::wait`]
/// to block until it completes, or [`AsyncCall::poll`] to check without
/// blocking.
pub struct AsyncCall<Resp> {
    receiver: mpsc::Receiver<AsyncCallResult<Resp>>,
}

impl<Resp> AsyncCall<Resp> {
    /// Blocks the calling thread until the worker thread finishes the call.
    pub fn wait(self) -> AsyncCallResult<Resp> {
        self.receiver
            .recv()
            .expect("call_unary_async worker thread dropped its sender without replying")
    }

    /// Returns the result if the worker thread has already finished, without
    /// blocking.
    pub fn poll(&self) -> Option<AsyncCallResult<Resp>> {
        self.receiver.try_recv().ok()
    }
}

/// Spawns a dedicated thread that performs `conn.call_unary(&method, &req)`
/// and returns a handle the caller can poll or block on. `conn` is moved
/// onto the worker thread for the duration of the call and handed back
/// through the channel once it completes, since only one call can be in
/// flight on a connection at a time.
pub fn call_unary_async<Req, Resp>(mut conn: Connection, method: String, req: Req) -> AsyncCall<Resp>
where
    Req: WireMessage + Send + 'static,
    Resp: WireMessage + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = conn.call_unary(&method, &req);
        let _ = tx.send((conn, result));
    });
    AsyncCall { receiver: rx }
}

/// Iterates the frames of a server-streamed response, one decoded `Resp` per
/// [`StreamCall::next`] call, until the server's zero-length terminator
/// frame is reached.
pub struct StreamCall<'a, Resp> {
    reader: &'a mut BufReader<TcpStream>,
    finished: bool,
    error: Option<CallError>,
    _marker: std::marker::PhantomData<Resp>,
}

impl<'a, Resp: WireMessage> StreamCall<'a, Resp> {
    /// Reads the next item, or `None` once the stream has ended (cleanly or
    /// due to an error -- check [`StreamCall::has_error`] to tell them
    /// apart).
    pub fn next(&mut self) -> Option<Resp> {
        if self.finished {
            return None;
        }

        match framing::read_stream_item(self.reader) {
            Ok(Some(bytes)) => {
                let mut r = Reader::new(&bytes);
                match read_object::<Resp>(&mut r) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        self.error = Some(e.into());
                        self.finished = true;
                        None
                    }
                }
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.error = Some(e.into());
                self.finished = true;
                None
            }
        }
    }

    pub fn has_more(&self) -> bool {
        !self.finished
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    /// Drains any remaining frames without decoding them, so the connection
    /// is left at a clean frame boundary for the next call.
    pub fn close(&mut self) {
        while !self.finished {
            match framing::read_stream_item(self.reader) {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => self.finished = true,
            }
        }
    }
}
