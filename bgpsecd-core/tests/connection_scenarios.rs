//! End-to-end scenarios driven over a real TCP socket against a live
//! [`ConnectionHandler`] (§8): handshake, origin-validation-miss, a missing-
//! update sign request, and transitive signature generation.

#![forbid(unsafe_code)]

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Decoder, Encoder};

use bgpsecd_core::config::{Config, QueueConfig, ServerConfig, SigningConfig};
use bgpsecd_core::connection::{ConnectionHandler, HandlerDeps};
use bgpsecd_core::model::{IpPrefix, Verdict};
use bgpsecd_core::signer::{CanonicalMessage, Signer};
use bgpsecd_core::validators::{MockAspaValidator, MockBgpsecValidator, MockOriginValidator};
use bgpsecd_core::wire::{
    ErrorCode, Pdu, PduCodec, VerifyFlags, VerifyRequestFields, PROTOCOL_VERSION, SKI_LEN,
};

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            listen: "127.0.0.1:0".to_string(),
            expected_proxies: 0,
            default_keep_window_secs: 5,
            sync_after_conn_established: false,
            local_asn: 65002,
        },
        queues: QueueConfig {
            receive_capacity: 16,
            send_capacity: 16,
            disable_receive_queue: false,
            disable_send_queue: false,
        },
        proxy_mappings: Default::default(),
        signing: SigningConfig::default(),
        logging: Default::default(),
    }
}

struct TestServer {
    addr: std::net::SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

async fn spawn_server(deps: HandlerDeps) -> TestServer {
    let config = test_config();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = ConnectionHandler::build(&config, deps);
    let task = tokio::spawn(async move {
        handler.serve(listener).await;
    });
    TestServer { addr, task }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A connected client driving the raw wire protocol, mirroring how
/// `session_task` itself frames PDUs: one [`PduCodec`] plus a growing
/// receive buffer, no `Framed` adapter.
struct Client {
    stream: TcpStream,
    codec: PduCodec,
    buf: BytesMut,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Client {
            stream: TcpStream::connect(addr).await.unwrap(),
            codec: PduCodec::new(),
            buf: BytesMut::new(),
        }
    }

    async fn send(&mut self, pdu: Pdu) {
        let mut out = BytesMut::new();
        self.codec.encode(pdu, &mut out).unwrap();
        self.stream.write_all(&out).await.unwrap();
    }

    async fn recv(&mut self) -> Pdu {
        loop {
            if let Some(pdu) = self.codec.decode(&mut self.buf).unwrap() {
                return pdu;
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed while waiting for a pdu");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn hello(&mut self, proxy_id: u32) {
        self.send(Pdu::Hello {
            version: PROTOCOL_VERSION,
            proxy_id,
            asn: 65001,
            ski: [0u8; SKI_LEN],
            peer_as: vec![],
        })
        .await;
        let response = self.recv().await;
        assert_eq!(response, Pdu::HelloResponse { proxy_id });
    }
}

fn no_op_deps() -> HandlerDeps {
    HandlerDeps {
        origin: Arc::new(MockOriginValidator::new(Verdict::NotFound)),
        bgpsec: Arc::new(MockBgpsecValidator::new(Verdict::Undefined)),
        aspa: Arc::new(MockAspaValidator::new(Verdict::Undefined)),
        signer: None,
    }
}

#[tokio::test]
async fn handshake_binds_the_first_free_slot() {
    let server = spawn_server(no_op_deps()).await;
    let mut client = Client::connect(server.addr).await;
    client.hello(0x0A0B0C0D).await;
}

#[tokio::test]
async fn origin_validation_miss_notifies_once_the_roa_validator_resolves_it() {
    let prefix = IpPrefix::v4(Ipv4Addr::new(192, 0, 2, 0), 24).unwrap();
    let origin = Arc::new(MockOriginValidator::new(Verdict::NotFound));
    origin.seed(prefix, 65001, Verdict::Valid);

    let deps = HandlerDeps {
        origin,
        bgpsec: Arc::new(MockBgpsecValidator::new(Verdict::Undefined)),
        aspa: Arc::new(MockAspaValidator::new(Verdict::Undefined)),
        signer: None,
    };
    let server = spawn_server(deps).await;
    let mut client = Client::connect(server.addr).await;
    client.hello(0x0A0B0C0D).await;

    client
        .send(Pdu::VerifyV4Request(VerifyRequestFields {
            flags: VerifyFlags::ROA | VerifyFlags::RECEIPT,
            as_type: 0,
            as_rel_type: 2,
            roa_default: Verdict::NotFound.to_wire(),
            bgpsec_default: Verdict::Undefined.to_wire(),
            aspa_default: Verdict::Undefined.to_wire(),
            request_token: 42,
            prefix,
            origin_as: 65001,
            bgpsec_data: None,
        }))
        .await;

    let notification = tokio::time::timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("server should notify once the roa validator resolves the update");
    match notification {
        Pdu::VerifyNotification(fields) => {
            assert_eq!(fields.request_token, 42);
            assert_eq!(fields.roa_result, Verdict::Valid.to_wire());
            assert!(fields.result_type.contains(VerifyFlags::RECEIPT));
        }
        other => panic!("expected a verify notification, got {other:?}"),
    }
}

#[tokio::test]
async fn sign_request_for_an_unknown_update_errors_then_asks_to_resync() {
    let server = spawn_server(no_op_deps()).await;
    let mut client = Client::connect(server.addr).await;
    client.hello(0x0A0B0C0D).await;

    client
        .send(Pdu::SignRequest {
            update_id: 0xDEADBEEF,
            algorithm: 1,
            block_type: 0,
            prepend_counter: 0,
            peer_as: 65010,
        })
        .await;

    assert_eq!(
        client.recv().await,
        Pdu::Error {
            code: ErrorCode::UpdateNotFound
        }
    );
    assert_eq!(client.recv().await, Pdu::SyncRequest);
}

#[tokio::test]
async fn sigtra_generation_request_signs_one_response_per_peer() {
    let signer = Arc::new(Signer::generate());
    let deps = HandlerDeps {
        origin: Arc::new(MockOriginValidator::new(Verdict::NotFound)),
        bgpsec: Arc::new(MockBgpsecValidator::new(Verdict::Undefined)),
        aspa: Arc::new(MockAspaValidator::new(Verdict::Undefined)),
        signer: Some(signer.clone()),
    };
    let server = spawn_server(deps).await;
    let mut client = Client::connect(server.addr).await;
    client.hello(0x0A0B0C0D).await;

    let prefix = IpPrefix::v4(Ipv4Addr::new(203, 0, 113, 0), 24).unwrap();
    let peers = vec![65010u32, 65020u32];
    client
        .send(Pdu::SigtraGenerationRequest {
            signature_id: 7,
            prefix,
            as_path: vec![65002, 65001],
            origin_as: 65001,
            timestamp: 1_700_000_000,
            otc_field: 0,
            prev_asn: 65001,
            current_asn: 65002,
            peers: peers.clone(),
        })
        .await;

    for peer in peers {
        let response = client.recv().await;
        match response {
            Pdu::SigtraSignatureResponse { signature_id, signature } => {
                assert_eq!(signature_id, 7);
                let message = CanonicalMessage {
                    otc_field: 0,
                    prev_asn: 65001,
                    current_asn: 65002,
                    next_asn: peer,
                    timestamp: 1_700_000_000,
                    prefix_len: 24,
                    prefix: prefix.to_u32(),
                };
                assert!(signer.verify(&message, &signature));
            }
            other => panic!("expected a sigtra signature response, got {other:?}"),
        }
    }
}
