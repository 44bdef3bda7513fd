//! GraphQL-over-HTTP implementation of [`Backend`].

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use votestorm_types::{
    AccountId, Ballot, DecodingSeed, ElectionHandle, ElectionSpec, ResultSet, SeedPhrase,
    VoteWeight,
};

use crate::backend::{Backend, Operation};
use crate::error::ClientError;

/// Default endpoint of a locally running election service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/graphql";

mod documents {
    pub const STORE_ELECTION: &str = r#"mutation storeElection($election: String!) {
  storeElection(electionJson: $election)
}"#;

    pub const SET_SEED: &str = r#"mutation seed($seed: String!, $account: Int!, $aindex: Int!) {
  setSeed(seed: $seed, idAccount: $account, aindex: $aindex)
}"#;

    pub const MINT: &str = r#"mutation mint($hash: String!, $account: Int!, $amount: BigDecimal!, $question: Int!) {
  mint(idAccount: $account, amount: $amount, idxQuestion: $question, hash: $hash)
}"#;

    pub const SCAN_BALLOTS: &str = r#"mutation scan($hash: String!, $accounts: [Int!]!) {
  scanBallots(hash: $hash, idAccounts: $accounts)
}"#;

    pub const VOTE: &str = r#"mutation vote($hash: String!, $account: Int!, $amount: BigDecimal!, $question: Int!, $answer: String!) {
  vote(idAccount: $account, amount: $amount, hash: $hash, idxQuestion: $question, voteContent: $answer)
}"#;

    pub const DECODE_BALLOTS: &str = r#"mutation decode($hash: String!, $seed: String!) {
  decodeBallots(electionSeed: $seed, hash: $hash)
}"#;

    pub const COLLECT_RESULTS: &str = r#"mutation collect {
  collectResults { idxQuestion idxSubQuestion idxAnswer votes }
}"#;

    pub const DECODE_AND_COLLECT: &str = r#"mutation decodeAndCollect($hash: String!, $seed: String!) {
  decodeBallots(electionSeed: $seed, hash: $hash)
  collectResults { idxQuestion idxSubQuestion idxAnswer votes }
}"#;

    pub const GET_BALANCE: &str = r#"query balance($hash: String!, $account: Int!, $question: Int!) {
  getBalance(hash: $hash, idAccount: $account, idxQuestion: $question)
}"#;
}

/// HTTP settings for [`GraphQlClient`].
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the election service's GraphQL endpoint.
///
/// Wraps `reqwest::Client` (which pools connections and is safe to share
/// between concurrent workers) with the endpoint URL and provides one typed
/// method per remote operation.
#[derive(Clone, Debug)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    options: ClientOptions,
}

impl GraphQlClient {
    /// Create a client targeting `endpoint` (e.g. `http://localhost:8000/graphql`).
    pub fn new(endpoint: impl Into<String>, options: ClientOptions) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(|e| {
                ClientError::transport(
                    Operation::SubmitElection,
                    format!("failed to create HTTP client: {e}"),
                )
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            options,
        })
    }

    /// The configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one GraphQL document and return its `data` object.
    async fn execute(
        &self,
        operation: Operation,
        query: &str,
        variables: Value,
    ) -> Result<Value, ClientError> {
        tracing::debug!(operation = %operation, endpoint = %self.endpoint, "graphql request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout {
                        operation,
                        after: self.options.request_timeout,
                    }
                } else {
                    ClientError::transport(operation, format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout {
                    operation,
                    after: self.options.request_timeout,
                }
            } else {
                ClientError::transport(operation, format!("failed to read response: {e}"))
            }
        })?;

        if status.is_server_error() {
            return Err(ClientError::transport(
                operation,
                format!("backend returned HTTP {status}"),
            ));
        }

        let json: Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(e) if status.is_success() => {
                return Err(ClientError::backend(
                    operation,
                    format!("invalid JSON response: {e}"),
                ))
            }
            Err(_) => {
                return Err(ClientError::backend(
                    operation,
                    format!("backend returned HTTP {status}"),
                ))
            }
        };

        if let Some(message) = first_error_message(&json) {
            return Err(ClientError::backend(operation, message));
        }
        if !status.is_success() {
            return Err(ClientError::backend(
                operation,
                format!("backend returned HTTP {status}"),
            ));
        }

        match json.get("data") {
            Some(data) if data.is_object() => Ok(data.clone()),
            _ => Err(ClientError::backend(operation, "response carried no data")),
        }
    }

    /// Execute a mutation whose field returns `true` on success.
    async fn acknowledge(
        &self,
        operation: Operation,
        query: &str,
        variables: Value,
    ) -> Result<(), ClientError> {
        let data = self.execute(operation, query, variables).await?;
        expect_ack(operation, &data, operation.as_str())
    }
}

fn first_error_message(json: &Value) -> Option<String> {
    let errors = json.get("errors")?.as_array()?;
    let first = errors.first()?;
    Some(
        first
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| first.to_string()),
    )
}

fn expect_ack(operation: Operation, data: &Value, field: &str) -> Result<(), ClientError> {
    match data.get(field) {
        Some(Value::Bool(true)) => Ok(()),
        Some(Value::Bool(false)) => Err(ClientError::backend(
            operation,
            format!("{field} returned false"),
        )),
        other => Err(ClientError::backend(
            operation,
            format!("unexpected {field} payload: {other:?}"),
        )),
    }
}

fn parse_results(operation: Operation, data: &Value) -> Result<ResultSet, ClientError> {
    let raw = data
        .get("collectResults")
        .cloned()
        .ok_or_else(|| ClientError::backend(operation, "missing collectResults"))?;
    serde_json::from_value(raw)
        .map_err(|e| ClientError::backend(operation, format!("invalid results: {e}")))
}

#[async_trait]
impl Backend for GraphQlClient {
    async fn submit_election(&self, spec: &ElectionSpec) -> Result<ElectionHandle, ClientError> {
        let op = Operation::SubmitElection;
        let election = spec
            .to_wire()
            .map_err(|e| ClientError::backend(op, e.to_string()))?;
        let data = self
            .execute(op, documents::STORE_ELECTION, json!({ "election": election }))
            .await?;
        data.get("storeElection")
            .and_then(Value::as_str)
            .map(ElectionHandle::new)
            .ok_or_else(|| ClientError::backend(op, "storeElection returned no hash"))
    }

    async fn register_seed(
        &self,
        _handle: &ElectionHandle,
        account: AccountId,
        seed: &SeedPhrase,
    ) -> Result<(), ClientError> {
        self.acknowledge(
            Operation::RegisterSeed,
            documents::SET_SEED,
            json!({ "seed": seed.expose(), "account": account.get(), "aindex": 0 }),
        )
        .await
    }

    async fn mint(
        &self,
        handle: &ElectionHandle,
        account: AccountId,
        amount: VoteWeight,
        question: u32,
    ) -> Result<(), ClientError> {
        self.acknowledge(
            Operation::Mint,
            documents::MINT,
            json!({
                "hash": handle,
                "account": account.get(),
                "amount": amount,
                "question": question,
            }),
        )
        .await
    }

    async fn scan_ballots(
        &self,
        handle: &ElectionHandle,
        accounts: &[AccountId],
    ) -> Result<(), ClientError> {
        let ids: Vec<u32> = accounts.iter().map(AccountId::get).collect();
        self.acknowledge(
            Operation::ScanBallots,
            documents::SCAN_BALLOTS,
            json!({ "hash": handle, "accounts": ids }),
        )
        .await
    }

    async fn cast_vote(&self, ballot: &Ballot) -> Result<(), ClientError> {
        self.acknowledge(
            Operation::CastVote,
            documents::VOTE,
            json!({
                "hash": ballot.hash,
                "account": ballot.account.get(),
                "amount": ballot.amount,
                "question": ballot.question,
                "answer": ballot.answer,
            }),
        )
        .await
    }

    async fn decode_ballots(
        &self,
        handle: &ElectionHandle,
        seed: &DecodingSeed,
    ) -> Result<(), ClientError> {
        self.acknowledge(
            Operation::DecodeBallots,
            documents::DECODE_BALLOTS,
            json!({ "hash": handle, "seed": seed.expose() }),
        )
        .await
    }

    async fn collect_results(
        &self,
        handle: Option<&ElectionHandle>,
    ) -> Result<ResultSet, ClientError> {
        // The service aggregates whatever it has decoded; the field takes no hash.
        if let Some(handle) = handle {
            tracing::trace!(hash = %handle, "collecting results");
        }
        let op = Operation::CollectResults;
        let data = self.execute(op, documents::COLLECT_RESULTS, json!({})).await?;
        parse_results(op, &data)
    }

    async fn decode_and_collect(
        &self,
        handle: &ElectionHandle,
        seed: &DecodingSeed,
    ) -> Result<ResultSet, ClientError> {
        let op = Operation::DecodeAndCollect;
        let data = self
            .execute(
                op,
                documents::DECODE_AND_COLLECT,
                json!({ "hash": handle, "seed": seed.expose() }),
            )
            .await?;
        expect_ack(op, &data, "decodeBallots")?;
        parse_results(op, &data)
    }

    async fn balance(
        &self,
        handle: &ElectionHandle,
        account: AccountId,
        question: u32,
    ) -> Result<VoteWeight, ClientError> {
        let op = Operation::Balance;
        let data = self
            .execute(
                op,
                documents::GET_BALANCE,
                json!({ "hash": handle, "account": account.get(), "question": question }),
            )
            .await?;
        let raw = data
            .get("getBalance")
            .cloned()
            .ok_or_else(|| ClientError::backend(op, "missing getBalance"))?;
        serde_json::from_value(raw)
            .map_err(|e| ClientError::backend(op, format!("invalid balance: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_message_prefers_message_field() {
        let json = json!({ "errors": [{ "message": "duplicate election" }, { "message": "x" }] });
        assert_eq!(first_error_message(&json).as_deref(), Some("duplicate election"));
        assert_eq!(first_error_message(&json!({ "errors": [] })), None);
        assert_eq!(first_error_message(&json!({ "data": {} })), None);
    }

    #[test]
    fn expect_ack_requires_true() {
        let data = json!({ "mint": true, "vote": false });
        assert!(expect_ack(Operation::Mint, &data, "mint").is_ok());
        assert!(expect_ack(Operation::CastVote, &data, "vote").is_err());
        assert!(expect_ack(Operation::ScanBallots, &data, "scanBallots").is_err());
    }

    #[test]
    fn documents_reference_their_fields() {
        for (doc, field) in [
            (documents::STORE_ELECTION, "storeElection"),
            (documents::SET_SEED, "setSeed"),
            (documents::MINT, "mint("),
            (documents::SCAN_BALLOTS, "scanBallots"),
            (documents::VOTE, "vote("),
            (documents::DECODE_BALLOTS, "decodeBallots"),
            (documents::COLLECT_RESULTS, "collectResults"),
            (documents::GET_BALANCE, "getBalance"),
        ] {
            assert!(doc.contains(field), "{field} missing");
        }
        assert!(documents::DECODE_AND_COLLECT.contains("decodeBallots"));
        assert!(documents::DECODE_AND_COLLECT.contains("collectResults"));
    }
}
