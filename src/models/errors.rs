use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing run parameter: {name}")]
    MissingParameter { name: &'static str },
    #[error("Invalid {name}: expected unix seconds, got {value:?}")]
    InvalidTimestamp { name: &'static str, value: String },
    #[error("Start timestamp {start} is after end timestamp {end}")]
    InvertedWindow { start: i64, end: i64 },
    #[error("Unknown bridge: {bridge_id}")]
    UnknownBridge { bridge_id: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Chain registry unavailable: no zones returned")]
    RegistryUnavailable,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChainError {
    #[error("Chain mapping is undefined for {bridge} bridge network")]
    MissingMapping { bridge: String },
    #[error("Could not find chain id for chain name {chain}")]
    Unresolvable { chain: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlockError {
    #[error("Invalid position of block: {got}")]
    InvalidBoundary { got: String },
    #[error("Latest block not found for chain {chain_id}")]
    LatestBlockNotFound { chain_id: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RangeError {
    #[error("Invalid block range: from {from} is after to {to}")]
    InvertedRange { from: u64, to: u64 },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransferError {
    #[error("Invalid timestamp {value:?} on transfer {tx_hash}")]
    InvalidTimestamp { tx_hash: String, value: String },
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("GraphQL errors: {}", messages.join("; "))]
    Graphql { messages: Vec<String> },
    #[error("GraphQL response carried no data")]
    MissingData,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
