//! XRPC-based repository client
//!
//! Direct implementation of the `RepoClient` trait on top of an `XrpcHandler`.
//! The handler decides where requests go and how they are authenticated.

use crate::client::RepoClient;
use crate::types::{ApplyWritesInput, DescribeRepoOutput, Did, ListRecordsOutput, RepoWrite};
use crate::xrpc::{XrpcError, XrpcHandler, XrpcRequest, XrpcResponse};
use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Repository client speaking XRPC through a handler
#[derive(Clone)]
pub struct XrpcClient {
    handler: Arc<dyn XrpcHandler>,
}

impl XrpcClient {
    /// Create a new client with the given handler
    pub fn new(handler: Arc<dyn XrpcHandler>) -> Self {
        Self { handler }
    }

    /// Send a request, turning non-2xx responses into `XrpcError`
    async fn call(&self, request: XrpcRequest) -> anyhow::Result<XrpcResponse> {
        let nsid = request.nsid.clone();
        let response = self
            .handler
            .send(request)
            .await
            .with_context(|| format!("Failed to call {}", nsid))?;

        if !response.is_success() {
            return Err(XrpcError::from_response(&response).into());
        }
        Ok(response)
    }

    /// Send a request and decode the JSON response body
    async fn call_json<T: DeserializeOwned>(&self, request: XrpcRequest) -> anyhow::Result<T> {
        let nsid = request.nsid.clone();
        let response = self.call(request).await?;
        serde_json::from_slice(&response.body)
            .with_context(|| format!("Invalid response body for {}", nsid))
    }
}

impl std::fmt::Debug for XrpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XrpcClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl RepoClient for XrpcClient {
    async fn describe_repo(&self, repo: &Did) -> anyhow::Result<DescribeRepoOutput> {
        debug!("Describing repo {}", repo);

        let request = XrpcRequest::query("com.atproto.repo.describeRepo").param("repo", repo);
        self.call_json(request).await
    }

    async fn list_records(
        &self,
        repo: &Did,
        collection: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> anyhow::Result<ListRecordsOutput> {
        debug!(
            "Listing records of {} in {} (limit={}, cursor={:?})",
            collection, repo, limit, cursor
        );

        let request = XrpcRequest::query("com.atproto.repo.listRecords")
            .param("repo", repo)
            .param("collection", collection)
            .param("limit", limit)
            .param_opt("cursor", cursor);
        let output: ListRecordsOutput = self.call_json(request).await?;

        debug!(
            "Listed {} records of {} (cursor={:?})",
            output.records.len(),
            collection,
            output.cursor
        );
        Ok(output)
    }

    async fn apply_writes(&self, repo: &Did, writes: &[RepoWrite]) -> anyhow::Result<()> {
        debug!("Applying {} writes to {}", writes.len(), repo);

        let body = serde_json::to_value(ApplyWritesInput { repo, writes })?;
        let request = XrpcRequest::procedure("com.atproto.repo.applyWrites", body);
        self.call(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xrpc::XrpcMethod;
    use std::sync::Mutex;

    /// Handler that records requests and answers with canned responses
    struct FakeHandler {
        requests: Mutex<Vec<XrpcRequest>>,
        responses: Mutex<Vec<XrpcResponse>>,
    }

    impl FakeHandler {
        fn new(responses: Vec<XrpcResponse>) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl XrpcHandler for FakeHandler {
        async fn send(&self, request: XrpcRequest) -> anyhow::Result<XrpcResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    fn ok(body: serde_json::Value) -> XrpcResponse {
        XrpcResponse {
            status: 200,
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    fn repo() -> Did {
        "did:plc:abc".parse().unwrap()
    }

    #[tokio::test]
    async fn test_describe_repo() {
        let handler = FakeHandler::new(vec![ok(serde_json::json!({
            "did": "did:plc:abc",
            "handle": "alice.test",
            "collections": ["app.bsky.feed.like", "app.bsky.feed.post"],
        }))]);
        let client = XrpcClient::new(handler.clone());

        let output = client.describe_repo(&repo()).await.unwrap();
        assert_eq!(output.collections.len(), 2);

        let requests = handler.requests.lock().unwrap();
        assert_eq!(requests[0].nsid, "com.atproto.repo.describeRepo");
        assert_eq!(requests[0].method, XrpcMethod::Get);
        assert_eq!(
            requests[0].params,
            vec![("repo".to_string(), "did:plc:abc".to_string())]
        );
    }

    #[tokio::test]
    async fn test_list_records_passes_cursor() {
        let handler = FakeHandler::new(vec![ok(serde_json::json!({
            "cursor": "next",
            "records": [],
        }))]);
        let client = XrpcClient::new(handler.clone());

        let output = client
            .list_records(&repo(), "app.bsky.feed.post", 100, Some("abc"))
            .await
            .unwrap();
        assert_eq!(output.cursor.as_deref(), Some("next"));

        let requests = handler.requests.lock().unwrap();
        let params: Vec<_> = requests[0]
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("repo", "did:plc:abc"),
                ("collection", "app.bsky.feed.post"),
                ("limit", "100"),
                ("cursor", "abc"),
            ]
        );
    }

    #[tokio::test]
    async fn test_apply_writes_body() {
        let handler = FakeHandler::new(vec![ok(serde_json::json!({}))]);
        let client = XrpcClient::new(handler.clone());

        let writes = vec![RepoWrite::delete("app.bsky.feed.post", "3k1")];
        client.apply_writes(&repo(), &writes).await.unwrap();

        let requests = handler.requests.lock().unwrap();
        assert_eq!(requests[0].method, XrpcMethod::Post);
        assert_eq!(
            requests[0].body,
            Some(serde_json::json!({
                "repo": "did:plc:abc",
                "writes": [{
                    "$type": "com.atproto.repo.applyWrites#delete",
                    "collection": "app.bsky.feed.post",
                    "rkey": "3k1",
                }],
            }))
        );
    }

    #[tokio::test]
    async fn test_service_error_is_typed() {
        let handler = FakeHandler::new(vec![XrpcResponse {
            status: 401,
            body: br#"{"error":"InvalidToken","message":"Token has expired"}"#.to_vec(),
        }]);
        let client = XrpcClient::new(handler);

        let err = client.describe_repo(&repo()).await.unwrap_err();
        let xrpc = err.downcast_ref::<XrpcError>().expect("typed XRPC error");
        assert_eq!(xrpc.status, 401);
        assert_eq!(xrpc.error, "InvalidToken");
    }
}
