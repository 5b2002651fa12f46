//! DNS Exchange Bridge
//!
//! Forwards engine DNS queries to the host resolver through an
//! [`ExchangeContext`] and turns whatever the host delivers back into a
//! [`Message`].
//!
//! ## Outcomes
//!
//! | Situation                          | Engine sees                     |
//! |------------------------------------|---------------------------------|
//! | no local transport                 | synthesized NXDOMAIN reply      |
//! | raw bytes delivered                | decoded message                 |
//! | undecodable bytes                  | `Transport` error               |
//! | addresses delivered (lookup mode)  | A/AAAA answers, NXDOMAIN if none|
//! | host error / scope cancelled       | `Transport` error               |
//! | host rejects the request           | `Transport` error, slot `Failed`|

use std::net::IpAddr;
use std::sync::Arc;

use bridge_traits::{ExchangeResponder, LocalDnsTransport};
use core_async::cancel::CancellationToken;
use core_runtime::{Error, Result};
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record, RecordType};
use tracing::{debug, trace};

use crate::exchange::{ExchangeContext, ExchangeOutcome};

/// TTL of answers synthesized from looked-up addresses.
pub const LOOKUP_ANSWER_TTL: u32 = 600;

#[derive(Clone, Default)]
pub struct DnsExchangeBridge {
    transport: Option<Arc<dyn LocalDnsTransport>>,
}

impl DnsExchangeBridge {
    pub fn new(transport: Option<Arc<dyn LocalDnsTransport>>) -> Self {
        Self { transport }
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn clear_cache(&self) {
        if let Some(transport) = &self.transport {
            transport.clear_cache();
        }
    }

    /// Resolves `request` through the host, honouring `scope`.
    ///
    /// Dropping the returned future abandons the exchange and runs the
    /// host's cancel callbacks, as if `scope` had fired.
    pub async fn exchange(&self, request: &Message, scope: &CancellationToken) -> Result<Message> {
        let Some(transport) = self.transport.as_ref() else {
            return Ok(reply_to(request, ResponseCode::NXDomain));
        };

        let context = ExchangeContext::new(scope);
        let _abandon = context.token().clone().drop_guard();
        context.spawn_watcher();

        let responder: Arc<dyn ExchangeResponder> = context.clone();
        let submitted = if transport.raw() {
            submit_raw(transport.as_ref(), responder, request)
        } else {
            submit_lookup(transport.as_ref(), responder, request)
        };
        if let Err(message) = submitted {
            // Settle before the abandon guard fires so the host's cancel
            // callbacks stay silent.
            context.error(message.clone());
            return Err(Error::Transport(message));
        }

        match context.wait().await {
            ExchangeOutcome::Delivered(bytes) => Message::from_vec(&bytes)
                .map_err(|e| Error::Transport(format!("decode dns response: {}", e))),
            ExchangeOutcome::Addresses(addresses) => Ok(answer_with(request, &addresses)),
            ExchangeOutcome::Failed(message) => Err(Error::Transport(message)),
            ExchangeOutcome::Cancelled => {
                debug!(exchange_id = context.id(), "dns exchange cancelled");
                Err(Error::Transport("dns exchange cancelled".to_string()))
            }
            ExchangeOutcome::Pending => Err(Error::Transport(
                "dns exchange ended without an answer".to_string(),
            )),
        }
    }
}

fn submit_raw(
    transport: &dyn LocalDnsTransport,
    responder: Arc<dyn ExchangeResponder>,
    request: &Message,
) -> std::result::Result<(), String> {
    let bytes = request
        .to_vec()
        .map_err(|e| format!("encode dns message: {}", e))?;
    transport
        .exchange(responder, &bytes)
        .map_err(|e| format!("host exchange: {}", e))
}

fn submit_lookup(
    transport: &dyn LocalDnsTransport,
    responder: Arc<dyn ExchangeResponder>,
    request: &Message,
) -> std::result::Result<(), String> {
    let query = request
        .queries()
        .first()
        .ok_or_else(|| "dns message has no question".to_string())?;
    let network = match query.query_type() {
        RecordType::A => "ip4",
        RecordType::AAAA => "ip6",
        _ => "ip",
    };
    let name = query.name().to_utf8();
    let domain = name.trim_end_matches('.');
    trace!(exchange_id = responder.id(), domain, network, "dns lookup");
    transport
        .lookup(responder, network, domain)
        .map_err(|e| format!("host lookup: {}", e))
}

impl std::fmt::Debug for DnsExchangeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsExchangeBridge")
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

/// An empty reply to `request` carrying `code`.
pub fn reply_to(request: &Message, code: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(request.op_code());
    response.set_recursion_desired(request.recursion_desired());
    response.set_checking_disabled(request.checking_disabled());
    response.set_response_code(code);
    if let Some(query) = request.queries().first() {
        response.add_query(query.clone());
    }
    response
}

fn answer_with(request: &Message, addresses: &[IpAddr]) -> Message {
    let Some(query) = request.queries().first() else {
        return reply_to(request, ResponseCode::NXDomain);
    };

    let mut response = reply_to(request, ResponseCode::NoError);
    response.set_recursion_available(true);
    for address in addresses {
        let rdata = match (address, query.query_type()) {
            (IpAddr::V4(v4), RecordType::A | RecordType::ANY) => RData::A(A(*v4)),
            (IpAddr::V6(v6), RecordType::AAAA | RecordType::ANY) => RData::AAAA(AAAA(*v6)),
            _ => continue,
        };
        response.add_answer(Record::from_rdata(
            query.name().clone(),
            LOOKUP_ANSWER_TTL,
            rdata,
        ));
    }

    if response.answers().is_empty() {
        response.set_response_code(ResponseCode::NXDomain);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::Query;
    use hickory_proto::rr::Name;
    use std::str::FromStr;

    fn query(name: &str, record_type: RecordType) -> Message {
        let mut message = Message::new();
        message.set_id(0x1234);
        message.set_recursion_desired(true);
        message.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
        message
    }

    #[test]
    fn test_reply_mirrors_request() {
        let request = query("example.com.", RecordType::A);
        let reply = reply_to(&request, ResponseCode::NXDomain);

        assert_eq!(reply.id(), 0x1234);
        assert_eq!(reply.message_type(), MessageType::Response);
        assert_eq!(reply.response_code(), ResponseCode::NXDomain);
        assert!(reply.recursion_desired());
        assert_eq!(reply.queries(), request.queries());
        assert!(reply.answers().is_empty());
    }

    #[test]
    fn test_answers_follow_query_type() {
        let request = query("example.com.", RecordType::AAAA);
        let addresses: Vec<IpAddr> = vec!["1.2.3.4".parse().unwrap(), "::1".parse().unwrap()];
        let response = answer_with(&request, &addresses);

        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert_eq!(response.answers().len(), 1);
        assert_eq!(response.answers()[0].ttl(), LOOKUP_ANSWER_TTL);
        assert_eq!(response.answers()[0].record_type(), RecordType::AAAA);
    }

    #[test]
    fn test_no_usable_address_is_nxdomain() {
        let request = query("example.com.", RecordType::A);
        let response = answer_with(&request, &["::1".parse().unwrap()]);
        assert_eq!(response.response_code(), ResponseCode::NXDomain);
    }

    #[core_async::test]
    async fn test_missing_transport_answers_nxdomain() {
        let bridge = DnsExchangeBridge::new(None);
        let request = query("blocked.test.", RecordType::A);

        let response = bridge
            .exchange(&request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.response_code(), ResponseCode::NXDomain);
        assert_eq!(response.id(), request.id());
        // Still a well-formed wire message.
        let bytes = response.to_vec().unwrap();
        assert_eq!(Message::from_vec(&bytes).unwrap().id(), 0x1234);
    }
}
