//! Envelope construction and signing
//!
//! Wraps an EVM message in a ledger-native transaction whose fee is paid
//! and signed by the relay's payer identity (`SIGN_MODE_DIRECT`).

use super::fee::FeeQuote;
use super::message::{EthereumMessage, TxKind};
use super::signer::PayerIdentity;
use crate::error::BuildError;
use crate::proto::{self, Any};

use prost::Message;
use sha2::{Digest, Sha256};

/// A signed, encoded envelope ready for broadcast
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    /// Encoded `TxRaw`
    pub tx_bytes: Vec<u8>,
    /// Upper-hex SHA-256 of `tx_bytes`, as the node reports it
    pub envelope_hash: String,
    pub sequence: u64,
}

/// Builds and signs envelopes for one payer on one chain
pub struct EnvelopeBuilder {
    identity: PayerIdentity,
    chain_id: String,
}

impl EnvelopeBuilder {
    pub fn new(identity: PayerIdentity, chain_id: impl Into<String>) -> Self {
        Self {
            identity,
            chain_id: chain_id.into(),
        }
    }

    pub fn identity(&self) -> &PayerIdentity {
        &self.identity
    }

    pub fn build(
        &self,
        message: &EthereumMessage,
        fee: &FeeQuote,
        account_number: u64,
        sequence: u64,
    ) -> Result<SignedEnvelope, BuildError> {
        // The ledger refuses replayable legacy transactions
        if message.kind() == TxKind::Legacy && message.chain_id().is_none() {
            return Err(BuildError::UnsupportedVariant(
                "legacy transaction without EIP-155 chain id".to_string(),
            ));
        }

        let extension = Any::pack(
            proto::TYPE_URL_EXTENSION_OPTIONS_ETHEREUM_TX,
            &proto::ExtensionOptionsEthereumTx {},
        );

        let gas_limit = message.gas_limit();

        let mut amount = Vec::with_capacity(1);
        if !fee.is_zero() {
            amount.push(proto::Coin {
                denom: fee.denom.clone(),
                amount: fee.amount.to_string(),
            });
        }

        // The payer is authoritative; the inbound sender field is dropped
        let mut msg = message.to_proto();
        msg.from.clear();

        let body = proto::TxBody {
            messages: vec![Any::pack(proto::TYPE_URL_MSG_ETHEREUM_TX, &msg)],
            memo: String::new(),
            timeout_height: 0,
            extension_options: vec![extension],
        };

        // Signer info must be complete before the sign doc is taken
        let signer_info = proto::SignerInfo {
            public_key: Some(Any::pack(
                proto::TYPE_URL_SECP256K1_PUBKEY,
                &proto::Secp256k1PubKey {
                    key: self.identity.public_key().to_vec(),
                },
            )),
            mode_info: Some(proto::ModeInfo {
                single: Some(proto::ModeInfoSingle {
                    mode: proto::SIGN_MODE_DIRECT,
                }),
            }),
            sequence,
        };

        let auth_info = proto::AuthInfo {
            signer_infos: vec![signer_info],
            fee: Some(proto::Fee {
                amount,
                gas_limit,
                payer: self.identity.bech32_address().to_string(),
                granter: String::new(),
            }),
        };

        let mut tx = proto::TxRaw {
            body_bytes: encode(&body)?,
            auth_info_bytes: encode(&auth_info)?,
            signatures: vec![Vec::new()],
        };

        let sign_doc = proto::SignDoc {
            body_bytes: tx.body_bytes.clone(),
            auth_info_bytes: tx.auth_info_bytes.clone(),
            chain_id: self.chain_id.clone(),
            account_number,
        };
        let signature = self.identity.sign(&encode(&sign_doc)?)?;
        tx.signatures = vec![signature];

        let tx_bytes = encode(&tx)?;
        let envelope_hash = hex::encode_upper(Sha256::digest(&tx_bytes));

        Ok(SignedEnvelope {
            tx_bytes,
            envelope_hash,
            sequence,
        })
    }
}

fn encode<M: Message>(msg: &M) -> Result<Vec<u8>, BuildError> {
    let mut buf = Vec::with_capacity(msg.encoded_len());
    msg.encode(&mut buf)
        .map_err(|e| BuildError::Encoding(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    /// Decoded view of an envelope, for assertions
    pub struct DecodedEnvelope {
        pub tx: proto::TxRaw,
        pub body: proto::TxBody,
        pub auth_info: proto::AuthInfo,
    }

    impl DecodedEnvelope {
        pub fn decode(tx_bytes: &[u8]) -> Self {
            let tx = proto::TxRaw::decode(tx_bytes).unwrap();
            let body = proto::TxBody::decode(tx.body_bytes.as_slice()).unwrap();
            let auth_info = proto::AuthInfo::decode(tx.auth_info_bytes.as_slice()).unwrap();
            Self {
                tx,
                body,
                auth_info,
            }
        }

        pub fn sequence(&self) -> u64 {
            self.auth_info.signer_infos[0].sequence
        }

        pub fn fee(&self) -> proto::Fee {
            self.auth_info.fee.clone().unwrap()
        }

        pub fn message(&self) -> proto::MsgEthereumTx {
            proto::MsgEthereumTx::decode(self.body.messages[0].value.as_slice()).unwrap()
        }
    }
}
