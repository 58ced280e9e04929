#![allow(dead_code)]

include!(concat!(env!("OUT_DIR"), "/fixtures.rs"));
pub use fixtures::*;

use bitrpc_rpc::server::{HandlerError, RpcServer, ServiceManager};
use std::sync::Arc;

pub struct EchoImpl;
impl EchoService for EchoImpl {
    fn echo(&self, req: EchoRequest) -> Result<EchoResponse, HandlerError> {
        Ok(EchoResponse {
            message: req.message,
            timestamp: req.timestamp,
            server_time: "2024-01-01T00:00:00Z".to_string(),
        })
    }
}

pub struct AuthImpl;
impl AuthService for AuthImpl {
    fn login(&self, req: LoginRequest) -> Result<LoginResponse, HandlerError> {
        if req.username == "admin" && req.password == "admin123" {
            Ok(LoginResponse {
                success: true,
                user: User {
                    user_id: 1,
                    username: "admin".to_string(),
                    email: "admin@test.com".to_string(),
                    roles: vec!["admin".to_string()],
                    is_active: true,
                },
                token: "admin-token-12345".to_string(),
                error_message: String::new(),
            })
        } else {
            Ok(LoginResponse {
                success: false,
                user: User::default(),
                token: String::new(),
                error_message: "Invalid username or password".to_string(),
            })
        }
    }
}

pub struct UserImpl;
impl UserService for UserImpl {
    fn get_user(&self, req: GetUserRequest) -> Result<GetUserResponse, HandlerError> {
        if req.user_id == 999 {
            return Ok(GetUserResponse {
                found: false,
                user: User::default(),
            });
        }
        Ok(GetUserResponse {
            found: true,
            user: User {
                user_id: req.user_id,
                ..User::default()
            },
        })
    }
}

pub struct CounterImpl;
impl CounterService for CounterImpl {
    fn count_up(&self, req: CountRequest, emit: &mut dyn FnMut(&CountItem)) -> Result<(), HandlerError> {
        for v in 1..=req.up_to {
            emit(&CountItem { value: v });
        }
        Ok(())
    }
}

/// Spins up every fixture service on one `RpcServer`, on a freshly bound
/// loopback port, and returns its address once the accept loop is running.
pub fn spawn_server() -> std::net::SocketAddr {
    let manager = Arc::new(ServiceManager::new());
    manager.register(Arc::new(EchoServiceDispatcher { inner: EchoImpl }));
    manager.register(Arc::new(AuthServiceDispatcher { inner: AuthImpl }));
    manager.register(Arc::new(UserServiceDispatcher { inner: UserImpl }));
    manager.register(Arc::new(CounterServiceDispatcher { inner: CounterImpl }));

    let server = RpcServer::bind("127.0.0.1:0", manager).unwrap();
    let addr = server.local_addr().unwrap();
    std::thread::spawn(move || {
        server.serve().unwrap();
    });
    std::thread::sleep(std::time::Duration::from_millis(20));
    addr
}
