//! DNS resolver trait and implementations.
//!
//! Allowed queries are forwarded through a [`DnsResolver`]. The resolver
//! itself does not enforce a deadline; the query handler bounds every
//! resolution with a single timeout and drops the future when it fires,
//! which also drops the socket and with it any late reply.

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::net::UdpSocket;

use crate::error::Result;

/// Receive buffer size; large enough for EDNS0 responses.
pub const MAX_UDP_DNS_SIZE: usize = 4096;

/// Trait for DNS resolution.
pub trait DnsResolver: Send + Sync + Clone + 'static {
    /// Resolve a DNS query and return the response.
    fn resolve(&self, query: &Message) -> impl Future<Output = Result<Message>> + Send;
}

/// Upstream DNS resolver using UDP.
///
/// Every query uses a fresh ephemeral socket connected to the upstream, so
/// replies can only come from the upstream address.
#[derive(Debug, Clone)]
pub struct UpstreamResolver {
    upstream_addr: SocketAddr,
}

impl UpstreamResolver {
    /// Create a new upstream resolver.
    pub const fn new(upstream_addr: SocketAddr) -> Self {
        Self { upstream_addr }
    }

    #[must_use]
    pub const fn upstream_addr(&self) -> SocketAddr {
        self.upstream_addr
    }

    fn bind_addr(&self) -> SocketAddr {
        match self.upstream_addr {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        }
    }
}

impl DnsResolver for UpstreamResolver {
    async fn resolve(&self, query: &Message) -> Result<Message> {
        let socket = UdpSocket::bind(self.bind_addr()).await?;
        socket.connect(self.upstream_addr).await?;

        let query_bytes = query.to_bytes()?;
        socket.send(&query_bytes).await?;

        let mut response_buf = [0u8; MAX_UDP_DNS_SIZE];
        loop {
            let len = socket.recv(&mut response_buf).await?;
            match Message::from_bytes(&response_buf[..len]) {
                Ok(response) if response.id() == query.id() => return Ok(response),
                Ok(response) => {
                    tracing::debug!(
                        expected = query.id(),
                        got = response.id(),
                        "discarding upstream reply with mismatched id"
                    );
                }
                Err(err) => {
                    tracing::debug!(error = %err, "discarding malformed upstream reply");
                }
            }
        }
    }
}
