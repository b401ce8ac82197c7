use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroizing;

use crate::error::{Result, SyncError};
use crate::mapper::RemoteTransaction;
use crate::models::SyncMode;

/// Large batches take the ledger a long time to ingest.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(500);

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    transactions: &'a [RemoteTransaction],
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub data: ResponseData,
    /// Free-form status block. Never validated, only surfaced in logs.
    #[serde(default)]
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseData {
    /// Raw remote representations, in the order the ledger returned them.
    #[serde(default)]
    pub transactions: Vec<Value>,
}

impl SyncResponse {
    pub fn result_message(&self) -> Option<String> {
        let result = self.result.as_ref()?;
        ["message", "status"]
            .iter()
            .filter_map(|key| result.get(key))
            .find(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

/// Seam between the orchestrator and the remote ledger.
pub trait LedgerApi {
    /// Send one batch. Transport, status and decoding failures come back as
    /// `Err`; nothing here panics.
    fn push(&self, mode: SyncMode, batch: &[RemoteTransaction]) -> Result<SyncResponse>;
}

pub struct HttpLedgerClient {
    http: Client,
    endpoint: String,
    token: Zeroizing<String>,
}

impl HttpLedgerClient {
    pub fn new(api_base: &str, account_id: &str, token: Zeroizing<String>) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint(api_base, account_id),
            token,
        })
    }
}

pub fn endpoint(api_base: &str, account_id: &str) -> String {
    format!("{}/{}/transactions", api_base.trim_end_matches('/'), account_id)
}

impl LedgerApi for HttpLedgerClient {
    fn push(&self, mode: SyncMode, batch: &[RemoteTransaction]) -> Result<SyncResponse> {
        let response = self
            .http
            .request(mode.method(), &self.endpoint)
            .bearer_auth(self.token.as_str())
            .header(ACCEPT, "application/json")
            .json(&BatchRequest { transactions: batch })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{PATCH, POST};
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_endpoint_joins_account() {
        assert_eq!(
            endpoint("https://ledger.example/v1/transactions/", "8841"),
            "https://ledger.example/v1/transactions/8841/transactions"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let txn = RemoteTransaction {
            id: None,
            date: "2025-01-15".to_string(),
            amount: -9.99,
            account_id: "acct-00001".to_string(),
            category_id: "cat-00001".to_string(),
            vendor_id: None,
            payee: None,
            notes: None,
            external_id: "12".to_string(),
        };
        let body = serde_json::to_value(BatchRequest { transactions: &[txn] }).unwrap();
        assert_eq!(body["transactions"][0]["external_id"], "12");
        assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_response_parses_transactions() {
        let json = r#"{"data": {"transactions": [{"id": 101}, {"id": "R2", "external_id": "9"}]}}"#;
        let resp: SyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.transactions.len(), 2);
        assert_eq!(resp.data.transactions[1]["id"], "R2");
        assert!(resp.result_message().is_none());
    }

    #[test]
    fn test_response_result_message() {
        let json = r#"{"data": {"transactions": []}, "result": {"status": "queued"}}"#;
        let resp: SyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.result_message().as_deref(), Some("queued"));
    }

    #[test]
    fn test_non_string_result_does_not_reject_body() {
        let json = r#"{"data": {"transactions": [{"id": "R1"}]}, "result": {"status": 200}}"#;
        let resp: SyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.transactions[0]["id"], "R1");
        assert_eq!(resp.result_message().as_deref(), Some("200"));
    }

    #[test]
    fn test_result_message_preferred_over_status() {
        let json = r#"{"data": {"transactions": []}, "result": {"message": "ok", "status": "queued"}}"#;
        let resp: SyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.result_message().as_deref(), Some("ok"));

        let odd: SyncResponse = serde_json::from_str(r#"{"result": "done"}"#).unwrap();
        assert!(odd.result_message().is_none());
    }

    #[test]
    fn test_unreadable_transactions_is_an_error() {
        let json = r#"{"data": {"transactions": "nope"}}"#;
        assert!(serde_json::from_str::<SyncResponse>(json).is_err());
    }

    #[test]
    fn test_missing_data_defaults_empty() {
        let resp: SyncResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.data.transactions.is_empty());
    }

    fn sample(id: Option<&str>) -> RemoteTransaction {
        RemoteTransaction {
            id: id.map(str::to_string),
            date: "2025-01-15".to_string(),
            amount: -42.5,
            account_id: "acct-00001".to_string(),
            category_id: "cat-00001".to_string(),
            vendor_id: None,
            payee: Some("Adobe".to_string()),
            notes: None,
            external_id: "12".to_string(),
        }
    }

    fn client_for(server: &MockServer) -> HttpLedgerClient {
        HttpLedgerClient::new(
            &server.url("/v1/transactions"),
            "8841",
            Zeroizing::new("tok-123".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_create_posts_batch_with_bearer_token() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/transactions/8841/transactions")
                .header("authorization", "Bearer tok-123")
                .header("accept", "application/json")
                .json_body_partial(
                    json!({
                        "transactions": [{
                            "date": "2025-01-15",
                            "amount": -42.5,
                            "account_id": "acct-00001",
                            "category_id": "cat-00001",
                            "payee": "Adobe",
                            "external_id": "12"
                        }]
                    })
                    .to_string(),
                );
            then.status(200).json_body(json!({
                "data": {"transactions": [{"id": 9001, "external_id": "12"}]}
            }));
        });

        let resp = client_for(&server).push(SyncMode::Create, &[sample(None)]).unwrap();
        create.assert();
        assert_eq!(resp.data.transactions[0]["id"], 9001);
    }

    #[test]
    fn test_update_patches_with_remote_id() {
        let server = MockServer::start();
        let update = server.mock(|when, then| {
            when.method(PATCH)
                .path("/v1/transactions/8841/transactions")
                .header("authorization", "Bearer tok-123")
                .json_body_partial(json!({"transactions": [{"id": "R-000042"}]}).to_string());
            then.status(200).json_body(json!({"data": {"transactions": []}}));
        });

        client_for(&server)
            .push(SyncMode::Update, &[sample(Some("R-000042"))])
            .unwrap();
        update.assert();
    }

    #[test]
    fn test_error_status_carries_body() {
        let server = MockServer::start();
        let rejected = server.mock(|when, then| {
            when.method(POST).path("/v1/transactions/8841/transactions");
            then.status(422).body("category_id is invalid");
        });

        let err = client_for(&server).push(SyncMode::Create, &[sample(None)]).unwrap_err();
        rejected.assert();
        match err {
            SyncError::Status { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "category_id is invalid");
            }
            other => panic!("expected status error, got {other}"),
        }
    }

    #[test]
    fn test_server_error_is_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH);
            then.status(503).body("maintenance");
        });
        let err = client_for(&server).push(SyncMode::Update, &[sample(Some("R1"))]).unwrap_err();
        assert!(matches!(err, SyncError::Status { status: 503, .. }));
    }

    #[test]
    fn test_malformed_success_body_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).body("<html>gateway</html>");
        });
        let err = client_for(&server).push(SyncMode::Create, &[sample(None)]).unwrap_err();
        assert!(matches!(err, SyncError::Json(_)));
    }

    #[test]
    fn test_unreachable_host_is_an_error() {
        let client = HttpLedgerClient::new(
            "http://127.0.0.1:9",
            "1",
            Zeroizing::new("token".to_string()),
        )
        .unwrap();
        assert!(client.push(SyncMode::Create, &[]).is_err());
    }
}
