//! # RPC Server and Client
//!
//! Requests travel over one bounded channel per topic, shared by every API
//! worker's server; whichever server is free takes the next call. Each call
//! carries a oneshot responder for its reply.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::endpoints::ApiEndpoints;
use super::requests::{ApiRequest, ApiResponse};
use crate::error::{GraphWorkersError, GraphWorkersResult};

type RpcResponder = oneshot::Sender<ApiResponse>;

/// One request in flight
#[derive(Debug)]
pub struct RpcCall {
    pub request: ApiRequest,
    pub resp: RpcResponder,
}

/// Receiving end of a topic, shared by the servers consuming it
pub type SharedRpcReceiver = Arc<Mutex<mpsc::Receiver<RpcCall>>>;

/// Create the request channel of `topic`
pub fn rpc_channel(topic: &str, buffer_size: usize) -> (ApiClient, SharedRpcReceiver) {
    let (sender, receiver) = mpsc::channel(buffer_size.max(1));
    (
        ApiClient {
            topic: Arc::from(topic),
            sender,
        },
        Arc::new(Mutex::new(receiver)),
    )
}

/// Cloneable caller handle
#[derive(Debug, Clone)]
pub struct ApiClient {
    topic: Arc<str>,
    sender: mpsc::Sender<RpcCall>,
}

impl ApiClient {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Send `request` and wait for a server's reply
    ///
    /// An [`ApiResponse::Error`] reply is returned as [`GraphWorkersError::Api`].
    pub async fn call(&self, request: ApiRequest) -> GraphWorkersResult<ApiResponse> {
        let method = request.method();
        let (resp, reply) = oneshot::channel();
        self.sender
            .send(RpcCall { request, resp })
            .await
            .map_err(|_| {
                GraphWorkersError::Api(format!("no RPC server is serving topic '{}'", self.topic))
            })?;

        match reply.await {
            Ok(ApiResponse::Error(message)) => Err(GraphWorkersError::Api(message)),
            Ok(response) => Ok(response),
            Err(_) => Err(GraphWorkersError::Api(format!(
                "RPC server dropped {method} call on topic '{}'",
                self.topic
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcServer {
    topic: String,
    endpoints: Arc<ApiEndpoints>,
}

impl RpcServer {
    pub fn new(topic: impl Into<String>, endpoints: ApiEndpoints) -> Self {
        Self {
            topic: topic.into(),
            endpoints: Arc::new(endpoints),
        }
    }

    /// Start serving on the current runtime
    ///
    /// Each call is dispatched on its own task so slow endpoints do not hold
    /// up the topic. The server stops once every client is dropped or the
    /// returned handle is aborted.
    pub fn start(self, receiver: SharedRpcReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(topic = %self.topic, "📡 RPC: Server listening");
            loop {
                let next = receiver.lock().await.recv().await;
                let Some(call) = next else {
                    debug!(topic = %self.topic, "RPC topic closed");
                    break;
                };

                let endpoints = self.endpoints.clone();
                tokio::spawn(async move {
                    let method = call.request.method();
                    let response = endpoints.dispatch(call.request).await;
                    if call.resp.send(response).is_err() {
                        debug!(method, "RPC caller went away before the reply");
                    }
                });
            }
        })
    }
}
