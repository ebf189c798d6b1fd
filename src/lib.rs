//! sharevote - shareholder voting chaincode with a development peer
//!
//! This library provides:
//! - The chaincode dispatcher (`init`, `invoke`, `query`) and its record handlers
//! - The `ChaincodeStub` state-access contract and an in-memory implementation
//! - A WAL-backed TCP development peer and a client for it

pub mod chaincode;
pub mod client;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod record;
pub mod stub;
pub mod wal;

pub use chaincode::{ShareVoteChaincode, INIT_KEY};
pub use client::Client;
pub use error::{FunctionKind, Result, ShareVoteError};
pub use peer::{PeerConfig, ShareVotePeer};
pub use protocol::{Command, Response};
pub use record::{Appointment, Record, SharesHeld, Subject, Vote};
pub use stub::{ChaincodeStub, MemoryStub};
