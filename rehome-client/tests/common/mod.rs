//! An in-process cluster of mock data centers.
//!
//! Each DC is a real TCP listener speaking the full wire protocol: plaintext
//! key exchange, sealed envelopes, rpc_result / rpc_error replies. Exchanged
//! keys live in a cluster-wide table keyed by key id, so a key created
//! against one DC is recognized when the client reconnects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use num_bigint::BigUint;
use rehome_crypto::{open, seal, AuthKey, Side};
use rehome_mtproto::{handshake, Envelope, Message, PlainSession};
use rehome_tl::{functions, types, Deserializable, Identifiable, Serializable};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How a DC answers `SendCode`.
#[derive(Clone, Copy)]
pub enum Reply {
    /// Answer with a sent-code result.
    Accept,
    /// `PHONE_MIGRATE_n` with code 303.
    Phone(i32),
    /// `NETWORK_MIGRATE_n` with code 303.
    Network(i32),
}

struct DcState {
    reply: Reply,
    handshakes: AtomicUsize,
    send_code_calls: AtomicUsize,
    config_calls: AtomicUsize,
    last_phone: Mutex<Option<String>>,
}

type KeyTable = Arc<Mutex<HashMap<[u8; 8], [u8; 256]>>>;

pub struct Cluster {
    dcs: HashMap<i32, Arc<DcState>>,
    ports: HashMap<i32, u16>,
}

impl Cluster {
    /// Bind one listener per DC, publish all of them in a shared option
    /// table, and start serving.
    pub async fn spawn(specs: &[(i32, Reply)]) -> Self {
        let keys: KeyTable = Arc::default();
        let mut dcs = HashMap::new();
        let mut ports = HashMap::new();
        let mut listeners = Vec::new();
        let mut options = Vec::new();

        // Bind everything first so the option table is complete before any
        // connection is served.
        for &(id, reply) in specs {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            options.push(types::DcOption {
                ipv6: false,
                media_only: false,
                this_port_only: true,
                id,
                ip_address: "127.0.0.1".to_string(),
                port: port as i32,
            });
            ports.insert(id, port);
            dcs.insert(
                id,
                Arc::new(DcState {
                    reply,
                    handshakes: AtomicUsize::new(0),
                    send_code_calls: AtomicUsize::new(0),
                    config_calls: AtomicUsize::new(0),
                    last_phone: Mutex::new(None),
                }),
            );
            listeners.push((id, listener));
        }

        let options = Arc::new(options);
        for (id, listener) in listeners {
            let dc = dcs[&id].clone();
            let options = options.clone();
            let keys = keys.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else { return };
                    let dc = dc.clone();
                    let options = options.clone();
                    let keys = keys.clone();
                    tokio::spawn(async move {
                        let _ = serve_conn(stream, id, dc, options, keys).await;
                    });
                }
            });
        }

        Self { dcs, ports }
    }

    /// Bootstrap address of a DC.
    pub fn addr(&self, dc_id: i32) -> (String, u16) {
        ("127.0.0.1".to_string(), self.ports[&dc_id])
    }

    pub fn handshakes(&self, dc_id: i32) -> usize {
        self.dcs[&dc_id].handshakes.load(Ordering::SeqCst)
    }

    pub fn send_code_calls(&self, dc_id: i32) -> usize {
        self.dcs[&dc_id].send_code_calls.load(Ordering::SeqCst)
    }

    pub fn config_calls(&self, dc_id: i32) -> usize {
        self.dcs[&dc_id].config_calls.load(Ordering::SeqCst)
    }

    /// The phone number the DC last saw in a `SendCode`, as received.
    pub fn last_phone(&self, dc_id: i32) -> Option<String> {
        self.dcs[&dc_id].last_phone.lock().unwrap().clone()
    }
}

// ─── Connection handler ───────────────────────────────────────────────────────

/// The server's pending half of a key exchange.
struct DhPending {
    server_nonce: [u8; 16],
    a: BigUint,
}

async fn serve_conn(
    mut stream: TcpStream,
    dc_id: i32,
    dc: Arc<DcState>,
    options: Arc<Vec<types::DcOption>>,
    keys: KeyTable,
) -> std::io::Result<()> {
    let mut plain = PlainSession::new();
    let mut pending: Option<DhPending> = None;

    loop {
        let mut len = [0u8; 4];
        if stream.read_exact(&mut len).await.is_err() {
            return Ok(()); // client hung up
        }
        let mut frame = vec![0u8; u32::from_le_bytes(len) as usize];
        stream.read_exact(&mut frame).await?;

        let reply = if frame.len() >= 8 && frame[..8] == [0u8; 8] {
            handle_plaintext(&frame, &mut plain, &mut pending, &dc, &keys)
        } else {
            handle_sealed(&frame, dc_id, &dc, &options, &keys)
        };
        let Some(reply) = reply else { return Ok(()) };

        stream.write_all(&(reply.len() as u32).to_le_bytes()).await?;
        stream.write_all(&reply).await?;
    }
}

fn handle_plaintext(
    frame: &[u8],
    plain: &mut PlainSession,
    pending: &mut Option<DhPending>,
    dc: &DcState,
    keys: &KeyTable,
) -> Option<Vec<u8>> {
    let msg = Message::from_plaintext_bytes(frame).ok()?;
    let cid = u32::from_le_bytes(msg.body.get(..4)?.try_into().unwrap());

    let body = match cid {
        functions::ReqDhNonce::CONSTRUCTOR_ID => {
            let req = functions::ReqDhNonce::from_bytes(&msg.body[4..]).ok()?;
            let prime = handshake::dh_prime();
            let server_nonce: [u8; 16] = rand_nonce();
            let a = BigUint::from_bytes_be(&rand_secret());
            let g_a = BigUint::from(3u32).modpow(&a, &prime);
            *pending = Some(DhPending { server_nonce, a });
            types::DhServerNonce {
                nonce: req.nonce,
                server_nonce,
                g: 3,
                dh_prime: prime.to_bytes_be(),
                g_a: g_a.to_bytes_be(),
            }
            .to_bytes()
        }
        functions::ReqDhExchange::CONSTRUCTOR_ID => {
            let req = functions::ReqDhExchange::from_bytes(&msg.body[4..]).ok()?;
            let side = pending.take()?;
            let prime = handshake::dh_prime();
            let gab = BigUint::from_bytes_be(&req.g_b).modpow(&side.a, &prime);
            let mut key = [0u8; 256];
            let bytes = gab.to_bytes_be();
            key[256 - bytes.len()..].copy_from_slice(&bytes);
            let auth = AuthKey::from_bytes(key);
            keys.lock().unwrap().insert(auth.key_id(), key);
            dc.handshakes.fetch_add(1, Ordering::SeqCst);
            rehome_tl::enums::DhAnswer::Done(types::DhDone {
                nonce: req.nonce,
                server_nonce: side.server_nonce,
                key_check: auth.confirm_hash(&side.server_nonce),
            })
            .to_bytes()
        }
        _ => return None,
    };

    Some(Message::plaintext(plain.next_msg_id(), body).to_plaintext_bytes())
}

fn handle_sealed(
    frame: &[u8],
    dc_id: i32,
    dc: &DcState,
    options: &[types::DcOption],
    keys: &KeyTable,
) -> Option<Vec<u8>> {
    let key_id: [u8; 8] = frame.get(..8)?.try_into().unwrap();
    // Unknown key id: the server side never saw this key, drop the session.
    let key = keys.lock().unwrap().get(&key_id).copied()?;
    let auth = AuthKey::from_bytes(key);

    let env = Envelope::from_bytes(&open(&auth, Side::Client, frame).ok()?).ok()?;
    let cid = u32::from_le_bytes(env.body.get(..4)?.try_into().unwrap());

    let body = match cid {
        functions::GetConfig::CONSTRUCTOR_ID => {
            dc.config_calls.fetch_add(1, Ordering::SeqCst);
            let config = types::Config {
                date: 1_700_000_000,
                this_dc: dc_id,
                dc_options: options.to_vec(),
            };
            rpc_result(env.msg_id, config.to_bytes())
        }
        functions::SendCode::CONSTRUCTOR_ID => {
            let req = functions::SendCode::from_bytes(&env.body[4..]).ok()?;
            *dc.last_phone.lock().unwrap() = Some(req.phone_number);
            dc.send_code_calls.fetch_add(1, Ordering::SeqCst);
            match dc.reply {
                Reply::Accept => {
                    let sent = types::SentCode {
                        phone_code_hash: format!("hash-dc{dc_id}"),
                        timeout: Some(60),
                    };
                    rpc_result(env.msg_id, sent.to_bytes())
                }
                Reply::Phone(n) => rpc_error(303, &format!("PHONE_MIGRATE_{n}")),
                Reply::Network(n) => rpc_error(303, &format!("NETWORK_MIGRATE_{n}")),
            }
        }
        _ => return None,
    };

    let reply = Envelope {
        session_id: env.session_id,
        msg_id: env.msg_id + 1,
        seq_no: 2,
        body,
    };
    Some(seal(&auth, Side::Server, &reply.to_bytes()))
}

fn rpc_result(req_msg_id: i64, result: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::new();
    rehome_tl::RPC_RESULT_ID.serialize(&mut out);
    req_msg_id.serialize(&mut out);
    out.extend(result);
    out
}

fn rpc_error(code: i32, message: &str) -> Vec<u8> {
    let mut out = Vec::new();
    rehome_tl::RPC_ERROR_ID.serialize(&mut out);
    code.serialize(&mut out);
    message.to_string().serialize(&mut out);
    out
}

fn rand_nonce() -> [u8; 16] {
    let mut buf = [0u8; 16];
    getrandom::getrandom(&mut buf).unwrap();
    buf
}

fn rand_secret() -> [u8; 256] {
    let mut buf = [0u8; 256];
    getrandom::getrandom(&mut buf).unwrap();
    buf
}
