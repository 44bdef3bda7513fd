//! GraphQL client tests against an in-process axum server.
//!
//! Each test spins up a one-route server that records the request bodies it
//! receives and answers with a canned status and body.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use votestorm_client::{Backend, ClientError, ClientOptions, GraphQlClient, Operation};
use votestorm_types::{
    AccountId, Ballot, DecodingSeed, ElectionHandle, ElectionSpec, EncodedAnswer, SeedPhrase,
    VoteWeight,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: Value,
    delay: Duration,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn graphql(State(state): State<MockState>, Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
    state.requests.lock().unwrap().push(request);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, Json(state.body.clone()))
}

async fn spawn_mock(status: StatusCode, body: Value, delay: Duration) -> (String, Arc<Mutex<Vec<Value>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        body,
        delay,
        requests: requests.clone(),
    };
    let app = Router::new().route("/graphql", post(graphql)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/graphql"), requests)
}

async fn ok_mock(data: Value) -> (GraphQlClient, Arc<Mutex<Vec<Value>>>) {
    let (url, requests) = spawn_mock(StatusCode::OK, json!({ "data": data }), Duration::ZERO).await;
    (client(&url), requests)
}

fn client(url: &str) -> GraphQlClient {
    GraphQlClient::new(
        url,
        ClientOptions {
            request_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(500),
        },
    )
    .unwrap()
}

fn handle() -> ElectionHandle {
    ElectionHandle::new("H1")
}

// ---------------------------------------------------------------------------
// Successful operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_election_sends_json_blob_and_returns_hash() {
    let (client, requests) = ok_mock(json!({ "storeElection": "abcd" })).await;
    let spec = ElectionSpec::reference();

    let handle = client.submit_election(&spec).await.unwrap();
    assert_eq!(handle.as_str(), "abcd");

    let sent = requests.lock().unwrap()[0].clone();
    assert!(sent["query"].as_str().unwrap().contains("storeElection"));
    let blob = sent["variables"]["election"].as_str().unwrap();
    assert_eq!(ElectionSpec::from_json(blob).unwrap(), spec);
}

#[tokio::test]
async fn mint_sends_amount_as_decimal_string() {
    let (client, requests) = ok_mock(json!({ "mint": true })).await;
    let amount: VoteWeight = "10000.5".parse().unwrap();

    client.mint(&handle(), AccountId::new(3), amount, 1).await.unwrap();

    let vars = requests.lock().unwrap()[0]["variables"].clone();
    assert_eq!(vars["hash"], "H1");
    assert_eq!(vars["account"], 3);
    assert_eq!(vars["amount"], "10000.5");
    assert_eq!(vars["question"], 1);
}

#[tokio::test]
async fn register_seed_sends_account_index_zero() {
    let (client, requests) = ok_mock(json!({ "setSeed": true })).await;
    let seed = SeedPhrase::new("abandon ability able");

    client.register_seed(&handle(), AccountId::new(7), &seed).await.unwrap();

    let vars = requests.lock().unwrap()[0]["variables"].clone();
    assert_eq!(vars["seed"], "abandon ability able");
    assert_eq!(vars["account"], 7);
    assert_eq!(vars["aindex"], 0);
}

#[tokio::test]
async fn scan_and_vote_send_expected_variables() {
    let (client, requests) = ok_mock(json!({ "scanBallots": true, "vote": true })).await;

    client
        .scan_ballots(&handle(), &[AccountId::new(1), AccountId::new(2)])
        .await
        .unwrap();
    client
        .cast_vote(&Ballot {
            account: AccountId::new(2),
            amount: VoteWeight::from_whole(20).unwrap(),
            hash: handle(),
            question: 1,
            answer: EncodedAnswer::synthetic(2),
        })
        .await
        .unwrap();

    let sent = requests.lock().unwrap().clone();
    assert_eq!(sent[0]["variables"]["accounts"], json!([1, 2]));
    assert_eq!(sent[1]["variables"]["answer"], "020304");
    assert_eq!(sent[1]["variables"]["amount"], "20");
}

#[tokio::test]
async fn decode_and_collect_is_one_request() {
    let (client, requests) = ok_mock(json!({
        "decodeBallots": true,
        "collectResults": [
            { "idxQuestion": 1, "idxSubQuestion": 0, "idxAnswer": 0, "votes": "30" }
        ]
    }))
    .await;

    let results = client
        .decode_and_collect(&handle(), &DecodingSeed::new("stool rich"))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(requests.lock().unwrap().len(), 1);
    let query = requests.lock().unwrap()[0]["query"].as_str().unwrap().to_string();
    assert!(query.contains("decodeBallots") && query.contains("collectResults"));
}

#[tokio::test]
async fn balance_parses_big_decimal_string() {
    let (client, _) = ok_mock(json!({ "getBalance": "10000.5" })).await;
    let balance = client.balance(&handle(), AccountId::new(1), 1).await.unwrap();
    assert_eq!(balance.to_string(), "10000.5");
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn graphql_errors_map_to_backend_error() {
    let (url, _) = spawn_mock(
        StatusCode::OK,
        json!({ "data": null, "errors": [{ "message": "Invalid account" }] }),
        Duration::ZERO,
    )
    .await;

    let err = client(&url)
        .mint(&handle(), AccountId::new(1), VoteWeight::ZERO, 1)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Backend { operation: Operation::Mint, ref message } if message == "Invalid account"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn server_error_status_is_transport_error() {
    let (url, _) = spawn_mock(StatusCode::SERVICE_UNAVAILABLE, json!({}), Duration::ZERO).await;
    let err = client(&url).collect_results(None).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { operation: Operation::CollectResults, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn false_acknowledgement_is_backend_error() {
    let (client, _) = ok_mock(json!({ "scanBallots": false })).await;
    let err = client.scan_ballots(&handle(), &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::Backend { .. }));
}

#[tokio::test]
async fn missing_data_is_backend_error() {
    let (url, _) = spawn_mock(StatusCode::OK, json!({}), Duration::ZERO).await;
    let err = client(&url).submit_election(&ElectionSpec::reference()).await.unwrap_err();
    assert!(matches!(err, ClientError::Backend { operation: Operation::SubmitElection, .. }));
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}/graphql"))
        .collect_results(None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }), "got {err:?}");
}

#[tokio::test]
async fn slow_backend_times_out() {
    let (url, _) = spawn_mock(
        StatusCode::OK,
        json!({ "data": { "collectResults": [] } }),
        Duration::from_secs(3),
    )
    .await;

    let err = client(&url).collect_results(None).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { operation: Operation::CollectResults, .. }), "got {err:?}");
}
