//! DNS exchange bridging against scripted host transports

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, CapabilitySet, ExchangeResponder, LocalDnsTransport};
use core_async::cancel::CancellationToken;
use core_async::time::{timeout, Duration};
use core_platform::{PlatformBridge, PlatformInterface, TunDeviceTable, LOOKUP_ANSWER_TTL};
use core_runtime::Error;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use parking_lot::Mutex;

fn query(name: &str, record_type: RecordType) -> Message {
    let mut message = Message::new();
    message.set_id(0xbeef);
    message.set_recursion_desired(true);
    message.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    message
}

fn bridge_with(transport: Arc<dyn LocalDnsTransport>) -> PlatformBridge {
    PlatformBridge::new(
        CapabilitySet::builder().local_dns(transport).build(),
        Arc::new(TunDeviceTable::new()),
    )
}

/// What the scripted host does with each exchange.
enum Script {
    /// Answer inline with the given raw bytes
    Answer(Vec<u8>),
    /// Keep the responder and answer later (or never)
    Hold,
    /// Fail the call itself
    Reject,
    /// Answer a lookup with addresses
    Addresses(Vec<IpAddr>),
}

struct ScriptedTransport {
    raw: bool,
    script: Script,
    held: Mutex<Vec<Arc<dyn ExchangeResponder>>>,
    lookups: Mutex<Vec<(String, String)>>,
    cancel_callbacks: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn new(raw: bool, script: Script) -> Arc<Self> {
        Arc::new(Self {
            raw,
            script,
            held: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            cancel_callbacks: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn respond(&self, context: Arc<dyn ExchangeResponder>) -> BridgeResult<()> {
        let counter = Arc::clone(&self.cancel_callbacks);
        context.on_cancel(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        match &self.script {
            Script::Answer(bytes) => {
                context.success(bytes.clone());
            }
            Script::Addresses(addresses) => {
                context.success_addresses(addresses.clone());
            }
            Script::Hold => self.held.lock().push(context),
            Script::Reject => {
                self.held.lock().push(context);
                return Err(BridgeError::OperationFailed("resolver offline".to_string()))
            }
        }
        Ok(())
    }
}

impl LocalDnsTransport for ScriptedTransport {
    fn raw(&self) -> bool {
        self.raw
    }

    fn exchange(&self, context: Arc<dyn ExchangeResponder>, _message: &[u8]) -> BridgeResult<()> {
        self.respond(context)
    }

    fn lookup(
        &self,
        context: Arc<dyn ExchangeResponder>,
        network: &str,
        domain: &str,
    ) -> BridgeResult<()> {
        self.lookups
            .lock()
            .push((network.to_string(), domain.to_string()));
        self.respond(context)
    }
}

#[core_async::test]
async fn test_raw_answer_is_decoded() {
    let request = query("example.com.", RecordType::A);
    let mut answer = request.clone();
    answer.set_message_type(MessageType::Response);
    answer.set_response_code(ResponseCode::Refused);

    let transport = ScriptedTransport::new(true, Script::Answer(answer.to_vec().unwrap()));
    let bridge = bridge_with(transport.clone());

    let response = bridge
        .exchange_dns(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.id(), 0xbeef);
    assert_eq!(response.response_code(), ResponseCode::Refused);
    assert_eq!(transport.cancel_callbacks.load(Ordering::SeqCst), 0);
}

#[core_async::test]
async fn test_undecodable_answer_is_transport_error() {
    let transport = ScriptedTransport::new(true, Script::Answer(vec![0xff]));
    let bridge = bridge_with(transport);

    let result = bridge
        .exchange_dns(&query("example.com.", RecordType::A), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::Transport(ref msg)) if msg.contains("decode")));
}

#[core_async::test]
async fn test_host_call_failure_fails_immediately() {
    let transport = ScriptedTransport::new(true, Script::Reject);
    let bridge = bridge_with(transport);

    let result = timeout(
        Duration::from_secs(5),
        bridge.exchange_dns(&query("example.com.", RecordType::A), &CancellationToken::new()),
    )
    .await
    .expect("a rejected exchange must not wait for an answer");
    assert!(matches!(result, Err(Error::Transport(ref msg)) if msg.contains("resolver offline")));
}

#[core_async::test]
async fn test_rejected_exchange_is_failed_not_cancelled() {
    for raw in [true, false] {
        let transport = ScriptedTransport::new(raw, Script::Reject);
        let bridge = bridge_with(transport.clone());

        let result = bridge
            .exchange_dns(&query("example.com.", RecordType::A), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::Transport(_))));

        for _ in 0..5 {
            core_async::task::yield_now().await;
        }
        assert_eq!(transport.cancel_callbacks.load(Ordering::SeqCst), 0);
        let held = transport.held.lock();
        assert_eq!(held.len(), 1);
        assert!(!held[0].success(vec![0]));
        assert!(!held[0].error("late".to_string()));
    }
}

#[core_async::test]
async fn test_cancellation_wins_over_late_answer() {
    let transport = ScriptedTransport::new(true, Script::Hold);
    let bridge = Arc::new(bridge_with(transport.clone()));
    let scope = CancellationToken::new();
    let request = query("slow.example.", RecordType::A);

    let pending = {
        let bridge = Arc::clone(&bridge);
        let scope = scope.clone();
        core_async::spawn(async move { bridge.exchange_dns(&request, &scope).await })
    };

    // Wait for the host to receive the exchange.
    while transport.held.lock().is_empty() {
        core_async::task::yield_now().await;
    }
    scope.cancel();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(Error::Transport(ref msg)) if msg.contains("cancelled")));
    assert_eq!(transport.cancel_callbacks.load(Ordering::SeqCst), 1);

    let held = transport.held.lock().pop().unwrap();
    assert!(held.is_cancelled());
    assert!(!held.success(vec![0; 12]));
    assert!(!held.error("too late".to_string()));
    assert!(held.is_cancelled());
}

#[core_async::test]
async fn test_held_exchange_answered_later() {
    let transport = ScriptedTransport::new(true, Script::Hold);
    let bridge = Arc::new(bridge_with(transport.clone()));
    let request = query("later.example.", RecordType::A);

    let pending = {
        let bridge = Arc::clone(&bridge);
        let request = request.clone();
        core_async::spawn(async move {
            bridge
                .exchange_dns(&request, &CancellationToken::new())
                .await
        })
    };

    while transport.held.lock().is_empty() {
        core_async::task::yield_now().await;
    }
    let held = transport.held.lock().pop().unwrap();
    assert!(held.error("SERVFAIL from upstream".to_string()));

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(Error::Transport(ref msg)) if msg == "SERVFAIL from upstream"));
}

#[core_async::test]
async fn test_lookup_transport_synthesizes_answers() {
    let transport = ScriptedTransport::new(
        false,
        Script::Addresses(vec![
            "93.184.216.34".parse().unwrap(),
            "2606:2800:220:1::".parse().unwrap(),
        ]),
    );
    let bridge = bridge_with(transport.clone());

    let response = bridge
        .exchange_dns(&query("example.com.", RecordType::A), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(response.answers().len(), 1);
    assert_eq!(response.answers()[0].ttl(), LOOKUP_ANSWER_TTL);
    assert_eq!(
        transport.lookups.lock().as_slice(),
        [("ip4".to_string(), "example.com".to_string())]
    );
}

#[core_async::test]
async fn test_lookup_without_addresses_is_nxdomain() {
    let transport = ScriptedTransport::new(false, Script::Addresses(Vec::new()));
    let bridge = bridge_with(transport);

    let response = bridge
        .exchange_dns(&query("nowhere.example.", RecordType::AAAA), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
}

#[core_async::test]
async fn test_no_transport_is_always_nxdomain() {
    let bridge = PlatformBridge::new(CapabilitySet::empty(), Arc::new(TunDeviceTable::new()));
    let scope = CancellationToken::new();
    scope.cancel();

    // Even an already-cancelled scope gets the deterministic answer.
    let response = bridge
        .exchange_dns(&query("example.com.", RecordType::A), &scope)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert_eq!(response.message_type(), MessageType::Response);
}
