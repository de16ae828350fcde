//! Riot API access.
//!
//! - [`transport`]: the GET seam and its reqwest implementation
//! - [`endpoints`]: path constants and host naming
//! - [`client`]: [`RiotClient`], which combines limiter, retrier and transport

pub mod client;
pub mod endpoints;
pub mod transport;

pub use client::{ApiRequest, MatchIdsQuery, RiotClient, RiotClientBuilder};
pub use transport::{HttpTransport, RawResponse, Transport};
