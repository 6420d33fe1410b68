//! Inbound domain message: a signed Ethereum-style transaction

use crate::error::BuildError;
use crate::proto::{self, Any};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::transaction::eip2930::AccessList;
use ethers::types::{Address, Bytes, NameOrAddress, Signature, H256, U256, U64};
use ethers::utils::rlp::Rlp;
use ethers::utils::to_checksum;
use sha3::{Digest, Keccak256};

/// Envelope family of the embedded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Legacy,
    AccessList,
    DynamicFee,
}

/// A decoded, externally signed EVM transaction.
///
/// Immutable after decode; the relay never re-signs or alters it.
#[derive(Debug, Clone)]
pub struct EthereumMessage {
    hash: H256,
    gas_limit: u64,
    chain_id: Option<u64>,
    kind: TxKind,
    /// Sender recovered from the signature, as carried in the message's
    /// `from` field by clients
    from: Address,
    /// Ledger encoding of the signed transaction
    data: Any,
}

impl EthereumMessage {
    /// Decode raw signed transaction bytes (legacy RLP or EIP-2718 typed)
    pub fn decode(raw: &[u8]) -> Result<Self, BuildError> {
        if raw.is_empty() {
            return Err(BuildError::InvalidMessage("empty transaction bytes".to_string()));
        }

        let rlp = Rlp::new(raw);
        let (tx, signature) = TypedTransaction::decode_signed(&rlp)
            .map_err(|e| BuildError::InvalidMessage(format!("malformed transaction: {}", e)))?;

        let gas = tx
            .gas()
            .copied()
            .ok_or_else(|| BuildError::InvalidMessage("transaction has no gas limit".to_string()))?;
        let gas_limit = to_u64(gas, "gas limit")?;

        let from = signature
            .recover(tx.sighash())
            .map_err(|e| BuildError::InvalidMessage(format!("invalid signature: {}", e)))?;

        let kind = match &tx {
            TypedTransaction::Legacy(_) => TxKind::Legacy,
            TypedTransaction::Eip2930(_) => TxKind::AccessList,
            TypedTransaction::Eip1559(_) => TxKind::DynamicFee,
        };

        Ok(Self {
            hash: H256::from_slice(&Keccak256::digest(raw)),
            gas_limit,
            chain_id: tx.chain_id().map(|id| id.as_u64()),
            kind,
            from,
            data: tx_data(&tx, &signature)?,
        })
    }

    /// Decode a `0x`-prefixed (or bare) hex string
    pub fn decode_hex(raw: &str) -> Result<Self, BuildError> {
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw)
            .map_err(|e| BuildError::InvalidMessage(format!("invalid hex: {}", e)))?;
        Self::decode(&bytes)
    }

    /// Ethereum transaction hash, keccak256 of the signed bytes
    pub fn hash(&self) -> H256 {
        self.hash
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn from(&self) -> Address {
        self.from
    }

    /// Wire form of the embedded message, including the inbound `from`
    pub fn to_proto(&self) -> proto::MsgEthereumTx {
        proto::MsgEthereumTx {
            data: Some(self.data.clone()),
            size: 0.0,
            hash: format!("{:?}", self.hash),
            from: format!("{:?}", self.from),
        }
    }
}

/// Ledger `TxData` for a signed transaction
fn tx_data(tx: &TypedTransaction, signature: &Signature) -> Result<Any, BuildError> {
    match tx {
        TypedTransaction::Legacy(req) => {
            let data = proto::LegacyTx {
                nonce: to_u64(req.nonce.unwrap_or_default(), "nonce")?,
                gas_price: decimal(req.gas_price),
                gas: to_u64(req.gas.unwrap_or_default(), "gas limit")?,
                to: recipient(req.to.as_ref())?,
                value: decimal(req.value),
                data: payload(req.data.as_ref()),
                // Legacy keeps the EIP-155 encoded v
                v: int_bytes(U256::from(signature.v)),
                r: int_bytes(signature.r),
                s: int_bytes(signature.s),
            };
            Ok(Any::pack(proto::TYPE_URL_LEGACY_TX, &data))
        }
        TypedTransaction::Eip2930(req) => {
            let data = proto::AccessListTx {
                chain_id: chain_id(req.tx.chain_id),
                nonce: to_u64(req.tx.nonce.unwrap_or_default(), "nonce")?,
                gas_price: decimal(req.tx.gas_price),
                gas: to_u64(req.tx.gas.unwrap_or_default(), "gas limit")?,
                to: recipient(req.tx.to.as_ref())?,
                value: decimal(req.tx.value),
                data: payload(req.tx.data.as_ref()),
                accesses: accesses(&req.access_list),
                v: y_parity(signature)?,
                r: int_bytes(signature.r),
                s: int_bytes(signature.s),
            };
            Ok(Any::pack(proto::TYPE_URL_ACCESS_LIST_TX, &data))
        }
        TypedTransaction::Eip1559(req) => {
            let data = proto::DynamicFeeTx {
                chain_id: chain_id(req.chain_id),
                nonce: to_u64(req.nonce.unwrap_or_default(), "nonce")?,
                gas_tip_cap: decimal(req.max_priority_fee_per_gas),
                gas_fee_cap: decimal(req.max_fee_per_gas),
                gas: to_u64(req.gas.unwrap_or_default(), "gas limit")?,
                to: recipient(req.to.as_ref())?,
                value: decimal(req.value),
                data: payload(req.data.as_ref()),
                accesses: accesses(&req.access_list),
                v: y_parity(signature)?,
                r: int_bytes(signature.r),
                s: int_bytes(signature.s),
            };
            Ok(Any::pack(proto::TYPE_URL_DYNAMIC_FEE_TX, &data))
        }
    }
}

fn to_u64(value: U256, field: &str) -> Result<u64, BuildError> {
    if value.bits() > 64 {
        return Err(BuildError::InvalidMessage(format!(
            "{} {} exceeds u64",
            field, value
        )));
    }
    Ok(value.as_u64())
}

fn decimal(value: Option<U256>) -> String {
    value.unwrap_or_default().to_string()
}

fn chain_id(chain_id: Option<U64>) -> String {
    chain_id.unwrap_or_default().as_u64().to_string()
}

/// Checksummed recipient; empty for contract creation
fn recipient(to: Option<&NameOrAddress>) -> Result<String, BuildError> {
    match to {
        None => Ok(String::new()),
        Some(NameOrAddress::Address(address)) => Ok(to_checksum(address, None)),
        Some(NameOrAddress::Name(name)) => Err(BuildError::InvalidMessage(format!(
            "unresolved recipient name {}",
            name
        ))),
    }
}

fn payload(data: Option<&Bytes>) -> Vec<u8> {
    data.map(|bytes| bytes.to_vec()).unwrap_or_default()
}

fn accesses(access_list: &AccessList) -> Vec<proto::AccessTuple> {
    access_list
        .0
        .iter()
        .map(|item| proto::AccessTuple {
            address: to_checksum(&item.address, None),
            storage_keys: item.storage_keys.iter().map(|key| format!("{:?}", key)).collect(),
        })
        .collect()
}

fn y_parity(signature: &Signature) -> Result<Vec<u8>, BuildError> {
    let id = signature
        .recovery_id()
        .map_err(|e| BuildError::InvalidMessage(format!("invalid signature: {}", e)))?;
    Ok(int_bytes(U256::from(id.to_byte())))
}

/// Big-endian bytes without leading zeros; zero is empty
fn int_bytes(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let start = buf.iter().position(|b| *b != 0).unwrap_or(buf.len());
    buf[start..].to_vec()
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::types::{Eip1559TransactionRequest, TransactionRequest};

    pub const SENDER_KEY: &str =
        "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    pub fn sender() -> LocalWallet {
        SENDER_KEY.parse::<LocalWallet>().unwrap().with_chain_id(9000u64)
    }

    /// Signed legacy transaction with the given nonce and gas
    pub fn signed_legacy(nonce: u64, gas: u64) -> Vec<u8> {
        let wallet = sender();
        let tx: TypedTransaction = TransactionRequest::new()
            .to(Address::zero())
            .value(0u64)
            .gas(gas)
            .gas_price(0u64)
            .nonce(nonce)
            .chain_id(9000u64)
            .into();
        let signature = wallet.sign_transaction_sync(&tx).unwrap();
        tx.rlp_signed(&signature).to_vec()
    }

    pub fn signed_dynamic_fee(nonce: u64, gas: u64) -> Vec<u8> {
        let wallet = sender();
        let tx: TypedTransaction = Eip1559TransactionRequest::new()
            .to(Address::zero())
            .value(0u64)
            .gas(gas)
            .max_fee_per_gas(1_000_000_000u64)
            .max_priority_fee_per_gas(1u64)
            .nonce(nonce)
            .chain_id(9000u64)
            .into();
        let signature = wallet.sign_transaction_sync(&tx).unwrap();
        tx.rlp_signed(&signature).to_vec()
    }

    pub fn message(nonce: u64) -> EthereumMessage {
        EthereumMessage::decode(&signed_legacy(nonce, 100_000)).unwrap()
    }
}
