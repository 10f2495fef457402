//! DNS server orchestration.
//!
//! Each query goes through classification, then the access policy, then is
//! either answered locally with a sinkhole record or forwarded upstream with
//! a bounded wait. Queries are handled independently of one another.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::dns::resolver::MAX_UDP_DNS_SIZE;
use crate::dns::{AccessPolicy, Classification, DnsResolver, DomainClassifier, domain, response};
use crate::error::{Error, Result};
use crate::metrics as counters;
use crate::store::{Storage, Stores};

/// Tunables for the query handler.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    /// TTL of sinkhole answers, in seconds.
    pub blocked_ttl: u32,
    /// How long to wait for the upstream before answering with no records.
    pub upstream_timeout: Duration,
}

impl HandlerOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            blocked_ttl: config.blocked_ttl_seconds,
            upstream_timeout: config.upstream_timeout(),
        }
    }
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            blocked_ttl: response::DEFAULT_BLOCKED_TTL,
            upstream_timeout: Duration::from_secs(1),
        }
    }
}

/// What the handler decided for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub domain: String,
    pub classification: Classification,
    pub blocked: bool,
}

/// DNS query handler.
///
/// Encapsulates the decision logic and the upstream forward, separated from
/// the socket loop for easier testing.
pub struct QueryHandler<R, S, C>
where
    R: DnsResolver,
    S: Storage,
    C: Clock,
{
    resolver: R,
    classifier: DomainClassifier<S>,
    policy: AccessPolicy<S, C>,
    options: HandlerOptions,
}

impl<R, S, C> QueryHandler<R, S, C>
where
    R: DnsResolver,
    S: Storage,
    C: Clock,
{
    /// Create a new query handler over the given stores.
    pub fn new(resolver: R, stores: &Stores<S>, clock: C, options: HandlerOptions) -> Self {
        Self {
            resolver,
            classifier: DomainClassifier::new(Arc::clone(&stores.classifications)),
            policy: AccessPolicy::new(Arc::clone(&stores.policy), clock),
            options,
        }
    }

    /// Classify `domain` and evaluate the access policy for it.
    pub async fn decide(&self, domain: &str) -> Decision {
        let classification = self.classifier.classify(domain).await;
        let blocked = self.policy.should_block(domain, classification).await;
        Decision {
            domain: domain.to_string(),
            classification,
            blocked,
        }
    }

    /// Handle a DNS query and return the response.
    ///
    /// Never fails: upstream problems produce a response without records.
    #[instrument(skip(self, query), fields(id = query.id(), domain))]
    pub async fn handle_query(&self, query: Message) -> Message {
        counters::record_query();

        let Some(question) = query.queries().first() else {
            warn!("query has no questions");
            return response::format_error(&query);
        };

        let Some(domain) = domain::from_name(question.name()) else {
            debug!("query for the root, forwarding unclassified");
            return self.forward(&query).await;
        };
        tracing::Span::current().record("domain", domain.as_str());

        let decision = self.decide(&domain).await;
        if decision.blocked {
            info!(classification = %decision.classification, "blocked");
            counters::record_blocked();
            return response::blocked(&query, self.options.blocked_ttl);
        }

        info!(classification = %decision.classification, "allowed");
        self.forward(&query).await
    }

    /// Forward `query` upstream and wait at most `upstream_timeout`.
    ///
    /// If the deadline passes first the pending resolution is dropped, so a
    /// reply arriving later can never produce a second answer.
    async fn forward(&self, query: &Message) -> Message {
        counters::record_forwarded();

        let timeout = self.options.upstream_timeout;
        let result = tokio::time::timeout(timeout, self.resolver.resolve(query))
            .await
            .unwrap_or_else(|_| Err(Error::UpstreamTimeout(timeout)));

        match result {
            Ok(upstream) => response::forwarded(query, &upstream),
            Err(err) => {
                let reason = match err {
                    Error::UpstreamTimeout(_) => "timeout",
                    _ => "error",
                };
                warn!(error = %err, "upstream failed, answering with no records");
                counters::record_upstream_failure(reason);
                response::empty(query)
            }
        }
    }
}

impl<R, S, C> Clone for QueryHandler<R, S, C>
where
    R: DnsResolver,
    S: Storage,
    C: Clock,
{
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            classifier: self.classifier.clone(),
            policy: self.policy.clone(),
            options: self.options.clone(),
        }
    }
}

/// Run the DNS server loop until `shutdown` changes or its sender is dropped.
///
/// Every datagram that parses as a DNS message is handled on its own task,
/// so a slow upstream only delays the query waiting on it.
pub async fn run_server<R, S, C>(
    socket: UdpSocket,
    handler: QueryHandler<R, S, C>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    R: DnsResolver,
    S: Storage,
    C: Clock,
{
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; MAX_UDP_DNS_SIZE];

    info!(addr = ?socket.local_addr().ok(), "DNS server listening");

    loop {
        let (len, peer) = tokio::select! {
            _ = shutdown.changed() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(err) => {
                    warn!("Failed to receive datagram: {}", err);
                    continue;
                }
            },
        };

        let query = match Message::from_bytes(&buf[..len]) {
            Ok(m) => m,
            Err(e) => {
                warn!(%peer, "Failed to parse DNS message: {}", e);
                continue;
            }
        };

        let handler = handler.clone();
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            let response = handler.handle_query(query).await;
            send_response(&socket, &response, peer).await;
        });
    }

    info!("DNS server stopped");
    Ok(())
}

async fn send_response(socket: &UdpSocket, response: &Message, peer: SocketAddr) {
    match response.to_bytes() {
        Ok(bytes) => {
            if let Err(e) = socket.send_to(&bytes, peer).await {
                warn!(%peer, "Failed to send response: {}", e);
            }
        }
        Err(e) => warn!(%peer, "Failed to encode response: {}", e),
    }
}

/// Process a single wire-format DNS query (useful for testing).
pub async fn process_query<R, S, C>(
    dns_payload: &[u8],
    handler: &QueryHandler<R, S, C>,
) -> Result<Vec<u8>>
where
    R: DnsResolver,
    S: Storage,
    C: Clock,
{
    let query = Message::from_bytes(dns_payload)?;
    let response = handler.handle_query(query).await;
    Ok(response.to_bytes()?)
}
