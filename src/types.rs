//! Request/response envelope and the Application-visible value types.

use serde::{Deserialize, Serialize};

/// Stable result-code enumeration. `Ok` is always 0. Values past it are
/// assigned sequentially in the order named, including the reserved `Base*`
/// block; see DESIGN.md for why these aren't lifted from an upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ResultCode {
    Ok = 0,
    InternalError = 1,
    EncodingError = 2,
    BadNonce = 3,
    Unauthorized = 4,
    InsufficientFunds = 5,
    UnknownRequest = 6,
    BaseDuplicateAddress = 7,
    BaseEncodingError = 8,
    BaseInsufficientFees = 9,
    BaseInsufficientFunds = 10,
    BaseInsufficientGasPrice = 11,
    BaseInvalidInput = 12,
    BaseInvalidOutput = 13,
    BaseInvalidPubKey = 14,
    BaseInvalidSequence = 15,
    BaseInvalidSignature = 16,
    BaseUnknownAddress = 17,
    BaseUnknownPlugin = 18,
    BaseUnknownPubKey = 19,
}

impl Default for ResultCode {
    fn default() -> Self {
        ResultCode::Ok
    }
}

/// An outcome value: a code, optional opaque data, and a free-form log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Result {
    pub code: ResultCode,
    pub data: Option<Vec<u8>>,
    pub log: String,
}

impl Result {
    pub fn ok() -> Self {
        Result {
            code: ResultCode::Ok,
            data: None,
            log: String::new(),
        }
    }

    pub fn with_code(code: ResultCode) -> Self {
        Result {
            code,
            data: None,
            log: String::new(),
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResultCode::Ok
    }
}

/// Validator public key, treated as an opaque byte string (no particular
/// signature scheme is mandated at this layer).
pub type PubKey = Vec<u8>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validator {
    pub pub_key: PubKey,
    pub power: u64,
}

/// A change to the validator set, returned from `EndBlock`. A `power` of 0
/// means "remove this validator".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorDiff {
    pub pub_key: PubKey,
    pub power: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    pub height: u64,
    pub time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub data: String,
    pub last_block_height: u64,
    pub last_block_app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub path: String,
    pub data: Vec<u8>,
    pub height: u64,
    pub prove: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub code: ResultCode,
    pub index: i64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub proof: Option<Vec<u8>>,
    pub height: u64,
    pub log: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitChainRequest {
    pub validators: Vec<Validator>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeginBlockRequest {
    pub hash: Vec<u8>,
    pub header: Header,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndBlockResponse {
    pub diffs: Vec<ValidatorDiff>,
}

/// The request envelope. One variant per Application method plus the two
/// transport-only variants `Echo`/`Flush`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Echo(String),
    Flush,
    Info,
    SetOption { key: String, value: String },
    DeliverTx(Vec<u8>),
    CheckTx(Vec<u8>),
    Commit,
    Query(QueryRequest),
    InitChain(InitChainRequest),
    BeginBlock(BeginBlockRequest),
    EndBlock { height: u64 },
}

impl Request {
    /// Name used in protocol-desync error messages and logs.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Request::Echo(_) => "Echo",
            Request::Flush => "Flush",
            Request::Info => "Info",
            Request::SetOption { .. } => "SetOption",
            Request::DeliverTx(_) => "DeliverTx",
            Request::CheckTx(_) => "CheckTx",
            Request::Commit => "Commit",
            Request::Query(_) => "Query",
            Request::InitChain(_) => "InitChain",
            Request::BeginBlock(_) => "BeginBlock",
            Request::EndBlock { .. } => "EndBlock",
        }
    }
}

/// The response envelope, one variant per request variant plus `Exception`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Exception(String),
    Echo(String),
    Flush,
    Info(Info),
    SetOption { log: String },
    DeliverTx(Result),
    CheckTx(Result),
    Commit(Result),
    Query(QueryResponse),
    InitChain,
    BeginBlock,
    EndBlock(EndBlockResponse),
}

impl Response {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Response::Exception(_) => "Exception",
            Response::Echo(_) => "Echo",
            Response::Flush => "Flush",
            Response::Info(_) => "Info",
            Response::SetOption { .. } => "SetOption",
            Response::DeliverTx(_) => "DeliverTx",
            Response::CheckTx(_) => "CheckTx",
            Response::Commit(_) => "Commit",
            Response::Query(_) => "Query",
            Response::InitChain => "InitChain",
            Response::BeginBlock => "BeginBlock",
            Response::EndBlock(_) => "EndBlock",
        }
    }

    /// Whether `self` is a valid answer to `req`, per variant shape.
    /// `Exception` always matches (it short-circuits the request).
    pub fn matches_request(&self, req: &Request) -> bool {
        matches!(
            (req, self),
            (_, Response::Exception(_))
                | (Request::Echo(_), Response::Echo(_))
                | (Request::Flush, Response::Flush)
                | (Request::Info, Response::Info(_))
                | (Request::SetOption { .. }, Response::SetOption { .. })
                | (Request::DeliverTx(_), Response::DeliverTx(_))
                | (Request::CheckTx(_), Response::CheckTx(_))
                | (Request::Commit, Response::Commit(_))
                | (Request::Query(_), Response::Query(_))
                | (Request::InitChain(_), Response::InitChain)
                | (Request::BeginBlock(_), Response::BeginBlock)
                | (Request::EndBlock { .. }, Response::EndBlock(_))
        )
    }
}
