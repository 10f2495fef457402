//! Construction of the responses sent back to clients.
//!
//! Every response echoes the query id and question section. Blocked names
//! get a single loopback A record whatever type was asked for, allowed names
//! get the upstream answer records, and a failed upstream yields no records.

use std::net::Ipv4Addr;

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};

/// Address returned for blocked names.
pub const SINKHOLE_ADDR: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Default TTL of sinkhole answers, in seconds.
pub const DEFAULT_BLOCKED_TTL: u32 = 300;

/// A response skeleton for `query`: id, flags and question copied, no records.
#[must_use]
pub fn empty(query: &Message) -> Message {
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_response_code(ResponseCode::NoError)
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true);

    for q in query.queries() {
        response.add_query(q.clone());
    }

    response
}

/// A response for a query that carries no question.
#[must_use]
pub fn format_error(query: &Message) -> Message {
    let mut response = empty(query);
    response.set_response_code(ResponseCode::FormErr);
    response
}

/// The sinkhole answer for a blocked query.
#[must_use]
pub fn blocked(query: &Message, ttl: u32) -> Message {
    let mut response = empty(query);

    if let Some(question) = query.queries().first() {
        let record = Record::from_rdata(question.name().clone(), ttl, RData::A(A(SINKHOLE_ADDR)));
        response.add_answer(record);
    }

    response
}

/// The answer for an allowed query: the upstream's answer records, verbatim.
///
/// The upstream response code is not carried over: an upstream NXDOMAIN
/// becomes NoError with no answers.
#[must_use]
pub fn forwarded(query: &Message, upstream: &Message) -> Message {
    let mut response = empty(query);
    for record in upstream.answers() {
        response.add_answer(record.clone());
    }
    response
}
