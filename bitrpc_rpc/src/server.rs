//! Blocking TCP server: one worker thread per connection, dispatching each
//! request frame to the [`Dispatch`] registered for its service name.
//!
//! An unknown service or method is a `DispatchError` (spec.md §7): the
//! connection stays open and the caller gets back a length-0 unary
//! response, since this is something a well-formed client can legitimately
//! hit (calling a method the server hasn't registered yet) rather than a
//! protocol-level failure. A body that fails to decode, or a user handler
//! that returns an error, is different -- the stream framing or the
//! service's internal state can no longer be trusted, so both close the
//! connection rather than attempt to send a response of any shape.

use std::collections::HashMap;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, RwLock};

use log::{debug, error, warn};

use crate::framing::{self, FramingError};
use crate::wire::WireError;

#[derive(Debug)]
pub enum HandlerError {
    UnknownMethod(String),
    Decode(WireError),
    /// A service implementation rejected the request on its own terms (bad
    /// input, internal failure, etc). The string is logged but, per the rule
    /// above, never sent to the client.
    User(String),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMethod(m) => write!(f, "unknown method '{m}'"),
            Self::Decode(e) => write!(f, "failed to decode request: {e}"),
            Self::User(msg) => write!(f, "handler error: {msg}"),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<WireError> for HandlerError {
    fn from(e: WireError) -> Self {
        Self::Decode(e)
    }
}

/// Receives the encoded bytes a [`Dispatch`] implementation produces and
/// writes them to the connection in the right framing shape. Generated
/// dispatcher code is the only thing that implements `Dispatch::call`, so
/// this trait only needs to be `impl`emented once, for a live TCP stream.
pub trait Responder {
    fn unary(&mut self, bytes: Vec<u8>);
    fn stream_item(&mut self, bytes: Vec<u8>);
    fn stream_end(&mut self);
}

/// One registered service: generated code emits a `<Service>Dispatcher<T>`
/// that implements this by decoding the request, calling into a concrete
/// `T: <Service>` implementation, and re-encoding the result.
pub trait Dispatch: Send + Sync {
    fn service_name(&self) -> &'static str;
    fn call(&self, method: &str, body: &[u8], respond: &mut dyn Responder) -> Result<(), HandlerError>;
}

/// Maps service names to their dispatcher. Additive: services are normally
/// all registered once at startup, but nothing prevents adding one later
/// (e.g. a service that becomes available after some initialization step).
#[derive(Default)]
pub struct ServiceManager {
    services: RwLock<HashMap<String, Arc<dyn Dispatch>>>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, dispatch: Arc<dyn Dispatch>) {
        let name = dispatch.service_name().to_string();
        self.services
            .write()
            .expect("service manager lock poisoned")
            .insert(name, dispatch);
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn Dispatch>> {
        self.services
            .read()
            .expect("service manager lock poisoned")
            .get(name)
            .cloned()
    }
}

pub struct RpcServer {
    listener: TcpListener,
    manager: Arc<ServiceManager>,
}

impl RpcServer {
    pub fn bind<A: std::net::ToSocketAddrs>(addr: A, manager: Arc<ServiceManager>) -> std::io::Result<Self> {
        Ok(RpcServer {
            listener: TcpListener::bind(addr)?,
            manager,
        })
    }

    /// The address actually bound, useful when `bind` was given port 0.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener is closed, spawning one worker
    /// thread per connection. Each worker serves requests on its connection
    /// until the peer disconnects or sends a frame the framing layer can't
    /// parse.
    pub fn serve(&self) -> std::io::Result<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let manager = Arc::clone(&self.manager);
                    std::thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, &manager) {
                            debug!("connection ended: {e}");
                        }
                    });
                }
                Err(e) => warn!("error accepting connection: {e}"),
            }
        }
        Ok(())
    }
}

struct StreamResponder<'a> {
    stream: &'a mut TcpStream,
    error: Option<FramingError>,
}

impl Responder for StreamResponder<'_> {
    fn unary(&mut self, bytes: Vec<u8>) {
        if let Err(e) = framing::write_unary_response(self.stream, &bytes) {
            self.error = Some(e);
        }
    }

    fn stream_item(&mut self, bytes: Vec<u8>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = framing::write_stream_item(self.stream, &bytes) {
            self.error = Some(e);
        }
    }

    fn stream_end(&mut self) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = framing::write_stream_end(self.stream) {
            self.error = Some(e);
        }
    }
}

fn handle_connection(mut stream: TcpStream, manager: &ServiceManager) -> Result<(), FramingError> {
    stream.set_nodelay(true)?;
    loop {
        let request = match framing::read_request(&mut stream) {
            Ok(r) => r,
            Err(FramingError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        debug!(
            "dispatching {}.{} ({} byte request)",
            request.service,
            request.method,
            request.body.len()
        );

        // spec.md §4.4.4 step 3 / §4.4.5: an unknown service gets a
        // length-0 unary response, not a closed connection -- the client
        // decodes the empty response as a failure on its own terms.
        let Some(dispatch) = manager.lookup(&request.service) else {
            warn!("no service registered for '{}'", request.service);
            framing::write_unary_response(&mut stream, &[])?;
            continue;
        };

        let mut responder = StreamResponder {
            stream: &mut stream,
            error: None,
        };

        let result = dispatch.call(&request.method, &request.body, &mut responder);

        if let Some(e) = responder.error.take() {
            return Err(e);
        }

        match result {
            Ok(()) => {}
            // Unknown operation: also a DispatchError per spec.md §7, also
            // answered with an empty unary response rather than a closed
            // connection.
            Err(HandlerError::UnknownMethod(m)) => {
                warn!("unknown method '{}.{}'", request.service, m);
                framing::write_unary_response(&mut stream, &[])?;
            }
            // Decode and user-handler errors leave the stream framing
            // unrecoverable or the service in an undefined state; both
            // close the connection per spec.md §4.4.5.
            Err(e) => {
                error!("handler error for '{}.{}': {e}, closing connection", request.service, request.method);
                return Ok(());
            }
        }
    }
}
