use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use series_ingestor::{
    gate::{MarketGate, StatusQueryGate},
    providers::{ProviderError, SessionProvider, nse::NseSession},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn headers() -> IndexMap<String, String> {
    let mut h = IndexMap::new();
    h.insert("user-agent".to_string(), "Mozilla/5.0 (ingest test)".to_string());
    h.insert("accept-language".to_string(), "en-GB,en;q=0.9".to_string());
    h.insert("accept-encoding".to_string(), "identity-only".to_string());
    h
}

async fn server_with_cookies() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "nsit=abc; Path=/; HttpOnly")
                .append_header("set-cookie", "bm_sv=xyz; Path=/; Secure"),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn fetch_sends_back_cookies_from_warmup() {
    let server = server_with_cookies().await;
    Mock::given(method("GET"))
        .and(path("/api/option-chain-indices"))
        .and(header("cookie", "nsit=abc; bm_sv=xyz"))
        .and(header("user-agent", "Mozilla/5.0 (ingest test)"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"records":{}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let session = NseSession::new(format!("{}/", server.uri()), &headers()).unwrap();
    let payload = session
        .try_fetch("api/option-chain-indices?symbol=NIFTY")
        .await
        .unwrap();

    assert_eq!(payload.status, 200);
    assert_eq!(payload.body, r#"{"records":{}}"#);
}

#[tokio::test]
async fn configured_accept_encoding_is_not_forwarded() {
    let server = server_with_cookies().await;
    Mock::given(method("GET"))
        .and(path("/api/marketStatus"))
        .and(header("accept-encoding", "identity-only"))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/marketStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let session = NseSession::new(server.uri(), &headers()).unwrap();
    let payload = session.try_fetch("/api/marketStatus").await.unwrap();
    assert_eq!(payload.status, 200);
}

#[tokio::test]
async fn non_success_status_is_returned_not_retried() {
    let server = server_with_cookies().await;
    Mock::given(method("GET"))
        .and(path("/api/liveEquity-derivatives"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let session = NseSession::new(server.uri(), &headers()).unwrap();
    let payload = session
        .acquire(
            "api/liveEquity-derivatives?index=nse50_opt",
            Duration::from_millis(10),
        )
        .await;
    assert_eq!(payload.status, 401);
    assert!(!payload.is_success());
}

#[tokio::test]
async fn unreachable_origin_fails_the_handshake() {
    let session = NseSession::new("http://127.0.0.1:9/", &headers()).unwrap();
    let err = session.try_fetch("api/marketStatus").await.unwrap_err();
    assert!(matches!(err, ProviderError::Handshake { .. }));
}

#[tokio::test]
async fn status_query_gate_reads_index_status() {
    let server = server_with_cookies().await;
    Mock::given(method("GET"))
        .and(path("/api/marketStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"marketState":[
                {"market":"Capital Market","index":"NIFTY 50","marketStatus":"Open"},
                {"market":"Currency","index":"","marketStatus":"Close"}
            ]}"#,
        ))
        .mount(&server)
        .await;

    let session = Arc::new(NseSession::new(server.uri(), &headers()).unwrap());
    let gate = StatusQueryGate::new(session, "api/marketStatus", "NIFTY 50", Duration::ZERO);
    assert!(gate.is_open().await);
}
