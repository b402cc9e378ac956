//! Test-only fixture Applications used to drive the end-to-end scenarios.
//! Not part of the library's public surface.

use std::sync::Mutex;

use abci_link::application::Application;
use abci_link::types::{
    EndBlockResponse, InitChainRequest, QueryRequest, QueryResponse, Result, ResultCode,
    Validator, ValidatorDiff,
};
use async_trait::async_trait;

/// Counter Application: in "serial" mode (after `SetOption("serial","on")`)
/// each tx must be the big-endian, zero-padded 8-byte encoding of the
/// current transaction count; any mismatch is rejected with `BadNonce`. In
/// non-serial (default) mode any tx is accepted.
pub struct CounterApplication {
    state: Mutex<CounterState>,
}

struct CounterState {
    tx_count: u64,
    serial: bool,
    committed_count: u64,
}

impl CounterApplication {
    pub fn new() -> Self {
        CounterApplication {
            state: Mutex::new(CounterState {
                tx_count: 0,
                serial: false,
                committed_count: 0,
            }),
        }
    }
}

#[async_trait]
impl Application for CounterApplication {
    async fn set_option(&self, key: &str, value: &str) -> String {
        if key == "serial" {
            let mut state = self.state.lock().unwrap();
            state.serial = value == "on";
        }
        String::new()
    }

    async fn deliver_tx(&self, tx: &[u8]) -> Result {
        let mut state = self.state.lock().unwrap();
        if state.serial {
            let mut padded = [0u8; 8];
            if tx.len() > 8 {
                return Result::with_code(ResultCode::EncodingError)
                    .with_log("tx longer than 8 bytes".to_string());
            }
            padded[8 - tx.len()..].copy_from_slice(tx);
            let value = u64::from_be_bytes(padded);
            if value != state.tx_count {
                return Result::with_code(ResultCode::BadNonce).with_log(format!(
                    "expected nonce {}, got {}",
                    state.tx_count, value
                ));
            }
        }
        state.tx_count += 1;
        Result::ok()
    }

    async fn commit(&self) -> Result {
        let mut state = self.state.lock().unwrap();
        state.committed_count = state.tx_count;
        Result::ok().with_data(state.committed_count.to_be_bytes().to_vec())
    }
}

/// In-memory key-value Application. Keys/values are `=`-delimited ASCII:
/// `DeliverTx(b"key=value")` sets `key`, `DeliverTx(b"key")` (no `=`) sets
/// `key` to itself (mirrors the upstream dummy Application's behavior of
/// storing the raw tx under itself when no `=` separator is present).
/// Persistence is out of scope; this is a pure in-memory store.
pub struct KvApplication {
    store: Mutex<std::collections::HashMap<Vec<u8>, Vec<u8>>>,
}

impl KvApplication {
    pub fn new() -> Self {
        KvApplication {
            store: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[async_trait]
impl Application for KvApplication {
    async fn deliver_tx(&self, tx: &[u8]) -> Result {
        let mut store = self.store.lock().unwrap();
        if let Some(pos) = tx.iter().position(|&b| b == b'=') {
            let (key, rest) = tx.split_at(pos);
            let value = &rest[1..];
            store.insert(key.to_vec(), value.to_vec());
        } else {
            store.insert(tx.to_vec(), tx.to_vec());
        }
        Result::ok()
    }

    async fn query(&self, req: QueryRequest) -> QueryResponse {
        let store = self.store.lock().unwrap();
        match store.get(&req.data) {
            Some(value) => QueryResponse {
                code: ResultCode::Ok,
                key: req.data,
                value: value.clone(),
                ..Default::default()
            },
            None => QueryResponse {
                code: ResultCode::Ok,
                key: req.data,
                value: Vec::new(),
                ..Default::default()
            },
        }
    }

    async fn commit(&self) -> Result {
        let store = self.store.lock().unwrap();
        // A stable, order-independent digest: fold over sorted keys.
        let mut keys: Vec<_> = store.keys().cloned().collect();
        keys.sort();
        let mut hash: u64 = 0xcbf29ce484222325;
        for key in &keys {
            for &b in key.iter().chain(store[key].iter()) {
                hash ^= b as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
        }
        Result::ok().with_data(hash.to_be_bytes().to_vec())
    }
}

/// Tracks validator-set changes across `InitChain`/`EndBlock` calls so tests
/// can assert the diffs an Application returns match the intended changes.
pub struct ValidatorApplication {
    validators: Mutex<std::collections::HashMap<Vec<u8>, u64>>,
    pending_changes: Mutex<Vec<ValidatorDiff>>,
}

impl ValidatorApplication {
    pub fn new() -> Self {
        ValidatorApplication {
            validators: Mutex::new(std::collections::HashMap::new()),
            pending_changes: Mutex::new(Vec::new()),
        }
    }

    /// Test-only hook: queue a validator-set change to surface from the
    /// next `end_block` call, mirroring how a real Application would stage
    /// changes while processing a block's transactions.
    pub fn queue_change(&self, pub_key: Vec<u8>, power: u64) {
        self.pending_changes
            .lock()
            .unwrap()
            .push(ValidatorDiff { pub_key, power });
    }
}

#[async_trait]
impl Application for ValidatorApplication {
    async fn deliver_tx(&self, _tx: &[u8]) -> Result {
        Result::ok()
    }

    async fn init_chain(&self, req: InitChainRequest) {
        let mut validators = self.validators.lock().unwrap();
        for v in req.validators {
            validators.insert(v.pub_key, v.power);
        }
    }

    async fn end_block(&self, _height: u64) -> EndBlockResponse {
        let mut validators = self.validators.lock().unwrap();
        let diffs: Vec<ValidatorDiff> = self.pending_changes.lock().unwrap().drain(..).collect();
        for diff in &diffs {
            if diff.power == 0 {
                validators.remove(&diff.pub_key);
            } else {
                validators.insert(diff.pub_key.clone(), diff.power);
            }
        }
        EndBlockResponse { diffs }
    }
}

pub fn validator(pub_key: &[u8], power: u64) -> Validator {
    Validator {
        pub_key: pub_key.to_vec(),
        power,
    }
}
