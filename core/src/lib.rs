//! Client core for the Splunk REST API.
//!
//! # Overview
//! A typed façade over splunkd's HTTP interface: session login and logout,
//! namespaced path qualification, generic GET/POST/DELETE dispatch and server
//! version comparison. Network I/O stays with the caller (host-does-IO
//! pattern): implement [`Http::make_request`] with any HTTP client and hand
//! it to [`Service::new`].
//!
//! # Design
//! - `Http` owns encoding and response parsing; only the round-trip is
//!   supplied by the host.
//! - `Context` holds the session; `Service` derefs to it and adds
//!   [`Service::specialize`].
//! - Failures are `SplunkError`; responses with status >= 400 also carry a
//!   `ResponseError` on `CompleteResponse::error`.

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod namespace;
pub mod service;

pub use config::Config;
pub use context::Context;
pub use error::{ResponseError, Result, SplunkError, SplunkMessage};
pub use http::{
    encode, CompleteResponse, Http, HttpMethod, HttpRequest, HttpResponse, Params, RequestMessage,
};
pub use namespace::{Namespace, Sharing};
pub use service::{BaseService, Service};
