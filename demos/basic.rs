//! Minimal fakeserve demo: scripts two calls, replays them with a client,
//! then prints what the server saw.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic

use fakeserve::{
    Server, Slot, combine, respond_with, respond_with_slot, verify_json, verify_request,
};
use http::{Method, StatusCode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let server = Server::start().await?;

    // POST /users → 201, body checked structurally.
    server.append_handler(combine!(
        verify_request(Method::POST, "/users"),
        verify_json(r#"{"name":"alice"}"#),
        respond_with(StatusCode::CREATED, r#"{"id":"99","name":"alice"}"#),
    ));

    // GET /users/99 → whatever the slots hold when the request arrives.
    let status = Slot::new(StatusCode::OK);
    let body = Slot::new(String::new());
    server.append_handler(combine!(
        verify_request(Method::GET, "/users/99"),
        respond_with_slot(&status, &body),
    ));
    body.set(r#"{"id":"99","name":"alice"}"#.to_owned());

    println!("fake server at {}", server.url());

    let client = reqwest::Client::new();

    let created = client
        .post(format!("{}/users", server.url()))
        .header("content-type", "application/json")
        .body(r#"{"name":"alice"}"#)
        .send()
        .await?;
    println!("POST /users -> {}", created.status());

    let fetched = client.get(format!("{}/users/99", server.url())).send().await?;
    let status = fetched.status();
    println!("GET /users/99 -> {status} {}", fetched.text().await?);

    for req in server.received_requests() {
        println!("received {} {}", req.method(), req.uri());
    }
    println!("failures: {:?}", server.failures().messages());

    server.close().await;
    Ok(())
}
