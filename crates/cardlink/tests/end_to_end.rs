//! Full-stack smoke test: the real `cardlink-registry` HTTP surface
//! wired to a real `cardlink-tunnel` listener, exercised exactly the way
//! a deployment would run them — login over HTTP, register a SIM,
//! authenticate both sides, connect and relay — over the actual
//! `Registry`/`Store` rather than a test double.

use std::{sync::Arc, time::Duration};

use bytes::BytesMut;
use cardlink_core::{
    proto::{
        AuthRequest, AuthRequestCodec, AuthResponseCodec, ConnectRequest, ConnectRequestCodec,
        ConnectResponseCodec,
    },
    types::{AuthStatus, ConnectStatus, Imsi, SessionToken, SimIdentifier, Token, TOKEN_LEN},
};
use cardlink_registry::{Registry, Store};
use cardlink_tunnel::{TunnelServer, TunnelServerOpts};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_util::{
    codec::{Decoder, Encoder},
    sync::CancellationToken,
};

#[test_log::test(tokio::test)]
async fn login_register_and_connect_over_the_real_stack() {
    let store = Arc::new(Store::new());
    let admin_token = Token::from_bytes([7u8; TOKEN_LEN]);
    store.register_admin_token(admin_token);

    let http_router = cardlink_registry::http::router(store.clone());
    let http_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(http_listener, http_router).await.unwrap();
    });

    let provider_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let provider_addr = provider_listener.local_addr().unwrap();
    let probe_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let probe_addr = probe_listener.local_addr().unwrap();
    drop(provider_listener);
    drop(probe_listener);

    let cancel = CancellationToken::new();
    let registry = Registry::new(store.clone());
    let tunnel = TunnelServer::new(
        TunnelServerOpts {
            provider_addr,
            probe_addr,
            provider_tls: None,
            auth_timeout: Duration::from_secs(5),
        },
        Arc::new(registry),
        cancel.clone(),
    );
    tokio::spawn(async move {
        let _ = tunnel.run().await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::new();

    let provider_login: serde_json::Value = client
        .post(format!("http://{http_addr}/login"))
        .bearer_auth(admin_token.as_base64())
        .json(&json!({ "provider": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let provider_session =
        SessionToken::from_base64(provider_login["session_token"].as_str().unwrap()).unwrap();

    let resp = client
        .put(format!("http://{http_addr}/provider/sims"))
        .bearer_auth(provider_session.as_base64())
        .json(&json!({ "sims": [{ "type": "imsi", "value": "123456789012345" }] }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let probe_login: serde_json::Value = client
        .post(format!("http://{http_addr}/login"))
        .bearer_auth(admin_token.as_base64())
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let probe_session =
        SessionToken::from_base64(probe_login["session_token"].as_str().unwrap()).unwrap();

    // A probe session is not a provider session: it must not be able to
    // overwrite the registry's SIM ownership.
    let forbidden = client
        .put(format!("http://{http_addr}/provider/sims"))
        .bearer_auth(probe_session.as_base64())
        .json(&json!({ "sims": [{ "type": "imsi", "value": "123456789012345" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), reqwest::StatusCode::FORBIDDEN);

    let mut provider = TcpStream::connect(provider_addr).await.unwrap();
    write_auth(&mut provider, provider_session).await;
    assert_eq!(read_auth_response(&mut provider).await, AuthStatus::Success);

    let mut probe = TcpStream::connect(probe_addr).await.unwrap();
    write_auth(&mut probe, probe_session).await;
    assert_eq!(read_auth_response(&mut probe).await, AuthStatus::Success);

    let sim = SimIdentifier::Imsi(Imsi::new("123456789012345").unwrap());
    let mut buf = BytesMut::new();
    ConnectRequestCodec
        .encode(ConnectRequest { identifier: sim }, &mut buf)
        .unwrap();
    probe.write_all(&buf).await.unwrap();

    let (probe_status, provider_status) = tokio::join!(
        read_connect_response(&mut probe),
        read_connect_response(&mut provider),
    );
    assert_eq!(probe_status, ConnectStatus::Success);
    assert_eq!(provider_status, ConnectStatus::Success);

    cancel.cancel();
}

async fn write_auth(stream: &mut TcpStream, token: SessionToken) {
    let mut buf = BytesMut::new();
    AuthRequestCodec
        .encode(
            AuthRequest {
                session_token: token,
            },
            &mut buf,
        )
        .unwrap();
    stream.write_all(&buf).await.unwrap();
}

async fn read_auth_response(stream: &mut TcpStream) -> AuthStatus {
    let mut raw = [0u8; 2];
    stream.read_exact(&mut raw).await.unwrap();
    let mut buf = BytesMut::from(&raw[..]);
    AuthResponseCodec.decode(&mut buf).unwrap().unwrap().status
}

async fn read_connect_response(stream: &mut TcpStream) -> ConnectStatus {
    let mut raw = [0u8; 2];
    stream.read_exact(&mut raw).await.unwrap();
    let mut buf = BytesMut::from(&raw[..]);
    ConnectResponseCodec.decode(&mut buf).unwrap().unwrap().status
}
