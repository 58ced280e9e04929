mod common;

use bitrpc_rpc::client::Connection;
use bitrpc_rpc::framing;
use bitrpc_rpc::wire::{write_object, Writer};
use common::*;

/// Scenario A, over the wire: client sends a real request frame, server
/// dispatches it through the generated `EchoServiceDispatcher`, and the
/// response carries back the same message and timestamp plus a server-set
/// field.
#[test]
fn scenario_a_echo_round_trips_over_tcp() {
    let addr = spawn_server();
    let mut conn = Connection::connect(addr).unwrap();

    let resp: EchoResponse = conn
        .call_unary(
            "EchoService.Echo",
            &EchoRequest {
                message: "hi".to_string(),
                timestamp: 7,
            },
        )
        .unwrap();

    assert_eq!(resp.message, "hi");
    assert_eq!(resp.timestamp, 7);
    assert_eq!(resp.server_time, "2024-01-01T00:00:00Z");
}

/// Scenario B: a successful login returns the full user record, including
/// its repeated `roles` field.
#[test]
fn scenario_b_login_success() {
    let addr = spawn_server();
    let mut conn = Connection::connect(addr).unwrap();

    let resp: LoginResponse = conn
        .call_unary(
            "AuthService.Login",
            &LoginRequest {
                username: "admin".to_string(),
                password: "admin123".to_string(),
            },
        )
        .unwrap();

    assert!(resp.success);
    assert_eq!(resp.user.user_id, 1);
    assert_eq!(resp.user.username, "admin");
    assert_eq!(resp.user.email, "admin@test.com");
    assert_eq!(resp.user.roles, vec!["admin".to_string()]);
    assert!(resp.user.is_active);
    assert_eq!(resp.token, "admin-token-12345");
    assert_eq!(resp.error_message, "");
}

/// Scenario C: a failed login carries an error message and an all-default
/// `user` (its presence bit never gets set).
#[test]
fn scenario_c_login_failure() {
    let addr = spawn_server();
    let mut conn = Connection::connect(addr).unwrap();

    let resp: LoginResponse = conn
        .call_unary(
            "AuthService.Login",
            &LoginRequest {
                username: "x".to_string(),
                password: "y".to_string(),
            },
        )
        .unwrap();

    assert!(!resp.success);
    assert_eq!(resp.user, User::default());
    assert_eq!(resp.error_message, "Invalid username or password");
}

/// Scenario D: an unknown user id comes back `found = false` with `user` at
/// its default -- the "empty wire" response.
#[test]
fn scenario_d_get_user_not_found() {
    let addr = spawn_server();
    let mut conn = Connection::connect(addr).unwrap();

    let resp: GetUserResponse = conn
        .call_unary("UserService.GetUser", &GetUserRequest { user_id: 999 })
        .unwrap();

    assert!(!resp.found);
    assert_eq!(resp.user, User::default());
}

/// Scenario E: a streamed response delivers every item in order, then ends.
#[test]
fn scenario_e_server_stream_delivers_items_then_ends() {
    let addr = spawn_server();
    let mut conn = Connection::connect(addr).unwrap();

    let mut call = conn
        .call_stream::<CountRequest, CountItem>("CounterService.CountUp", &CountRequest { up_to: 3 })
        .unwrap();

    let mut values = Vec::new();
    while let Some(item) = call.next() {
        values.push(item.value);
    }
    assert!(!call.has_error());
    assert_eq!(values, vec![1, 2, 3]);
}

/// Scenario F: truncating a request frame by one byte must not desync the
/// connection -- the server closes rather than dispatching a malformed call.
#[test]
fn scenario_f_truncated_request_closes_the_connection() {
    let addr = spawn_server();
    let mut stream = std::net::TcpStream::connect(addr).unwrap();

    let mut w = Writer::new();
    write_object(
        &mut w,
        &EchoRequest {
            message: "hi".to_string(),
            timestamp: 7,
        },
    );
    let body = w.into_vec();

    let mut payload = Vec::new();
    {
        let mut name_w = Writer::new();
        name_w.write_string("EchoService.Echo");
        payload.extend_from_slice(&name_w.into_vec());
    }
    payload.extend_from_slice(&body);
    payload.pop();

    std::io::Write::write_all(&mut stream, &(payload.len() as u32).to_le_bytes()).unwrap();
    std::io::Write::write_all(&mut stream, &payload).unwrap();

    // The server never produces a response for a frame it can't parse; the
    // connection is closed instead, so the next read hits EOF.
    let mut buf = [0u8; 1];
    let n = std::io::Read::read(&mut stream, &mut buf).unwrap();
    assert_eq!(n, 0, "server must close the connection, not answer it");
}

/// Property 7: on one connection, unary responses arrive in request order.
#[test]
fn property_ordering_on_one_connection() {
    let addr = spawn_server();
    let mut conn = Connection::connect(addr).unwrap();

    for i in 0..5 {
        let resp: EchoResponse = conn
            .call_unary(
                "EchoService.Echo",
                &EchoRequest {
                    message: format!("msg-{i}"),
                    timestamp: i,
                },
            )
            .unwrap();
        assert_eq!(resp.message, format!("msg-{i}"));
        assert_eq!(resp.timestamp, i);
    }
}

/// Property 6 (unary half): the server answers exactly once per unary call,
/// and a follow-up request on the same connection still gets its own
/// correctly-paired response -- no extra or missing frames leak between
/// calls.
#[test]
fn property_framing_one_response_per_unary_call() {
    let addr = spawn_server();
    let mut conn = Connection::connect(addr).unwrap();

    let first: EchoResponse = conn
        .call_unary(
            "EchoService.Echo",
            &EchoRequest {
                message: "first".to_string(),
                timestamp: 1,
            },
        )
        .unwrap();
    let second: EchoResponse = conn
        .call_unary(
            "EchoService.Echo",
            &EchoRequest {
                message: "second".to_string(),
                timestamp: 2,
            },
        )
        .unwrap();

    assert_eq!(first.message, "first");
    assert_eq!(second.message, "second");
}

/// Unknown service/method: a `DispatchError` is a length-0 unary response,
/// not a closed connection.
#[test]
fn unknown_method_gets_empty_response_and_connection_survives() {
    let addr = spawn_server();
    let mut stream = std::net::TcpStream::connect(addr).unwrap();

    framing::write_request(&mut stream, "EchoService", "DoesNotExist", false, &[]).unwrap();
    let response = framing::read_unary_response(&mut stream).unwrap();
    assert!(response.is_empty());

    framing::write_request(&mut stream, "Nope", "Whatever", false, &[]).unwrap();
    let response = framing::read_unary_response(&mut stream).unwrap();
    assert!(response.is_empty());

    // The connection is still usable afterwards.
    let mut conn = Connection::from_stream(stream).unwrap();
    let resp: EchoResponse = conn
        .call_unary(
            "EchoService.Echo",
            &EchoRequest {
                message: "still alive".to_string(),
                timestamp: 1,
            },
        )
        .unwrap();
    assert_eq!(resp.message, "still alive");
}
