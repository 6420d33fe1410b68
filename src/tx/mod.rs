//! Envelope pipeline: domain message decoding, fee estimation, account
//! sequencing, and signing

pub mod account;
pub mod builder;
pub mod fee;
pub mod message;
pub mod signer;

pub use account::{AccountPhase, AccountState};
pub use builder::EnvelopeBuilder;
pub use fee::FeeEstimator;
pub use message::EthereumMessage;
pub use signer::PayerIdentity;
