//! # API Module
//!
//! Read and query endpoints served by API workers over their graph replica,
//! plus the in-process RPC transport that carries calls to them.

pub mod endpoints;
pub mod requests;
pub mod server;

pub use endpoints::{
    AlarmApis, ApiEndpoints, EventApis, OperationalApis, RcaApis, ResourceApis, SharedGraph,
    TemplateApis, TopologyApis, WebhookApis,
};
pub use requests::{ApiRequest, ApiResponse, ApiStatus, RcaGraph, TemplateSummary};
pub use server::{rpc_channel, ApiClient, RpcCall, RpcServer, SharedRpcReceiver};
