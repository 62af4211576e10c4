//! In-process aggregation endpoint.

use parking_lot::Mutex;
use relaydb_sync_engine::{LoopbackClient, LoopbackServer, TransportFailure};
use relaydb_sync_protocol::{AckResponse, BatchRequest};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// How the aggregator answers a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Store the records and acknowledge every `_u`.
    Accept,
    /// Store the records but acknowledge only the first `n` uuids, as if
    /// part of the acknowledgment were lost.
    AcceptFirst(usize),
    /// Answer with this status and store nothing.
    Reject(String),
    /// Fail at the transport level with an optional HTTP status.
    Unreachable(Option<u16>),
    /// Answer with this raw body and store nothing.
    Raw(Vec<u8>),
}

#[derive(Debug, Default)]
struct State {
    baseline: u64,
    default_reply: Option<Reply>,
    scripted: VecDeque<Reply>,
    requests: Vec<BatchRequest>,
    stored: BTreeSet<String>,
}

/// An endpoint that counts distinct `_u` values, the way a real aggregator
/// deduplicates retried uploads.
///
/// Replies are taken from a script first (one per request), then from the
/// default reply, which starts as [`Reply::Accept`]. Requests with the wrong
/// shared secret are rejected with status `"unauthorized"`.
#[derive(Debug)]
pub struct MemoryAggregator {
    shared_secret: String,
    state: Mutex<State>,
}

impl MemoryAggregator {
    /// An aggregator that expects `shared_secret`.
    pub fn new(shared_secret: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            shared_secret: shared_secret.into(),
            state: Mutex::new(State::default()),
        })
    }

    /// A client posting to `aggregator`.
    pub fn client(aggregator: &Arc<Self>) -> LoopbackClient<Self> {
        LoopbackClient::new(Arc::clone(aggregator))
    }

    /// Adds `baseline` to every reported total, as if other devices had
    /// already uploaded that many records.
    pub fn set_baseline(&self, baseline: u64) {
        self.state.lock().baseline = baseline;
    }

    /// Reply used once the script is exhausted.
    pub fn set_reply(&self, reply: Reply) {
        self.state.lock().default_reply = Some(reply);
    }

    /// Queues replies for the next requests, in arrival order.
    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.state.lock().scripted.extend(replies);
    }

    /// Every request decoded so far, in arrival order.
    pub fn requests(&self) -> Vec<BatchRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Distinct uuids stored.
    pub fn unique_count(&self) -> usize {
        self.state.lock().stored.len()
    }

    /// Whether `uuid` has been stored.
    pub fn has_stored(&self, uuid: &Uuid) -> bool {
        self.state.lock().stored.contains(&uuid.to_string())
    }

    /// Total uuids received across all requests, duplicates included.
    pub fn received_count(&self) -> usize {
        self.state.lock().requests.iter().map(BatchRequest::len).sum()
    }
}

impl LoopbackServer for MemoryAggregator {
    fn handle_post(&self, _url: &str, body: &[u8]) -> Result<Vec<u8>, TransportFailure> {
        let mut state = self.state.lock();
        let reply = state
            .scripted
            .pop_front()
            .or_else(|| state.default_reply.clone())
            .unwrap_or(Reply::Accept);

        let request = match BatchRequest::decode(body) {
            Ok(request) => request,
            Err(err) => return Err(TransportFailure::with_status(400, err.to_string())),
        };
        let authorized = request.shared_secret == self.shared_secret;
        let uuids: Vec<String> = request.uuids().map(str::to_owned).collect();
        state.requests.push(request);

        let acknowledged = match reply {
            Reply::Unreachable(status) => {
                return Err(TransportFailure {
                    status,
                    message: "aggregator unreachable".into(),
                })
            }
            Reply::Raw(raw) => return Ok(raw),
            Reply::Reject(status) => return encode(&AckResponse::rejected(status)),
            _ if !authorized => return encode(&AckResponse::rejected("unauthorized")),
            Reply::Accept => uuids.len(),
            Reply::AcceptFirst(n) => n.min(uuids.len()),
        };

        state.stored.extend(uuids.iter().cloned());
        let total = state.baseline + state.stored.len() as u64;
        let mut ack = AckResponse::ok(Vec::new(), total);
        for text in uuids.into_iter().take(acknowledged) {
            match Uuid::parse_str(&text) {
                Ok(uuid) => ack.stored_uuids.push(uuid),
                Err(_) => ack.unparsed_uuids.push(text),
            }
        }
        encode(&ack)
    }
}

fn encode(ack: &AckResponse) -> Result<Vec<u8>, TransportFailure> {
    ack.encode()
        .map_err(|err| TransportFailure::with_status(500, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydb_codec::Entry;
    use relaydb_sync_protocol::WireRecord;

    fn upload(secret: &str, uuids: &[Uuid]) -> Vec<u8> {
        let payload = Entry::new();
        BatchRequest::new(secret, "device")
            .with_records(uuids.iter().enumerate().map(|(n, uuid)| WireRecord {
                sequence: n as u64 + 1,
                uuid: *uuid,
                payload: &payload,
            }))
            .encode()
            .unwrap()
    }

    #[test]
    fn duplicates_are_counted_once() {
        let aggregator = MemoryAggregator::new("pw");
        let uuids = [Uuid::new_v4(), Uuid::new_v4()];
        aggregator.handle_post("", &upload("pw", &uuids)).unwrap();
        let body = aggregator.handle_post("", &upload("pw", &uuids)).unwrap();
        let ack = AckResponse::decode(&body).unwrap();
        assert_eq!(ack.total_count, Some(2));
        assert_eq!(aggregator.unique_count(), 2);
        assert_eq!(aggregator.received_count(), 4);
        assert!(aggregator.has_stored(&uuids[1]));
        assert!(!aggregator.has_stored(&Uuid::new_v4()));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let aggregator = MemoryAggregator::new("pw");
        let body = aggregator
            .handle_post("", &upload("guess", &[Uuid::new_v4()]))
            .unwrap();
        assert!(!AckResponse::decode(&body).unwrap().is_ok());
        assert_eq!(aggregator.unique_count(), 0);
    }

    #[test]
    fn script_runs_before_default() {
        let aggregator = MemoryAggregator::new("pw");
        aggregator.script([Reply::Unreachable(Some(503))]);
        aggregator.set_reply(Reply::AcceptFirst(1));
        let uuids = [Uuid::new_v4(), Uuid::new_v4()];
        let err = aggregator.handle_post("", &upload("pw", &uuids)).unwrap_err();
        assert_eq!(err.status, Some(503));
        let body = aggregator.handle_post("", &upload("pw", &uuids)).unwrap();
        assert_eq!(AckResponse::decode(&body).unwrap().stored_uuids, vec![uuids[0]]);
    }
}
