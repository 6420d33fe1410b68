//! Protobuf wire types for the ledger's transaction envelope and queries
//!
//! Only the fields the relay reads or writes are declared; prost skips
//! unknown fields on decode.

use prost::Message;

pub const TYPE_URL_MSG_ETHEREUM_TX: &str = "/ethermint.evm.v1.MsgEthereumTx";
pub const TYPE_URL_LEGACY_TX: &str = "/ethermint.evm.v1.LegacyTx";
pub const TYPE_URL_ACCESS_LIST_TX: &str = "/ethermint.evm.v1.AccessListTx";
pub const TYPE_URL_DYNAMIC_FEE_TX: &str = "/ethermint.evm.v1.DynamicFeeTx";
pub const TYPE_URL_EXTENSION_OPTIONS_ETHEREUM_TX: &str =
    "/ethermint.evm.v1.ExtensionOptionsEthereumTx";
pub const TYPE_URL_SECP256K1_PUBKEY: &str = "/cosmos.crypto.secp256k1.PubKey";
pub const TYPE_URL_BASE_ACCOUNT: &str = "/cosmos.auth.v1beta1.BaseAccount";
pub const TYPE_URL_ETH_ACCOUNT: &str = "/ethermint.types.v1.EthAccount";

pub const QUERY_PATH_ACCOUNT: &str = "/cosmos.auth.v1beta1.Query/Account";
pub const QUERY_PATH_BASE_FEE: &str = "/ethermint.evm.v1.Query/BaseFee";
pub const QUERY_PATH_FEE_MARKET_PARAMS: &str = "/ethermint.feemarket.v1.Query/Params";

/// `SIGN_MODE_DIRECT`
pub const SIGN_MODE_DIRECT: i32 = 1;

#[derive(Clone, PartialEq, Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

impl Any {
    pub fn pack<M: Message>(type_url: &str, msg: &M) -> Self {
        Self {
            type_url: type_url.to_string(),
            value: msg.encode_to_vec(),
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

// Envelope

#[derive(Clone, PartialEq, Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
    #[prost(message, repeated, tag = "1023")]
    pub extension_options: Vec<Any>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuthInfo {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfo>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignerInfo {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<Any>,
    #[prost(message, optional, tag = "2")]
    pub mode_info: Option<ModeInfo>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

/// `ModeInfo` with only the `single` arm of its oneof
#[derive(Clone, PartialEq, Message)]
pub struct ModeInfo {
    #[prost(message, optional, tag = "1")]
    pub single: Option<ModeInfoSingle>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModeInfoSingle {
    #[prost(int32, tag = "1")]
    pub mode: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Fee {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<Coin>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignDoc {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(string, tag = "3")]
    pub chain_id: String,
    #[prost(uint64, tag = "4")]
    pub account_number: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Secp256k1PubKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

/// Embedded EVM message (evmos v19 layout). The signed transaction travels
/// in `data` as one of [`LegacyTx`], [`AccessListTx`] or [`DynamicFeeTx`].
#[derive(Clone, PartialEq, Message)]
pub struct MsgEthereumTx {
    #[prost(message, optional, tag = "1")]
    pub data: Option<Any>,
    /// Deprecated, left at zero
    #[prost(double, tag = "2")]
    pub size: f64,
    #[prost(string, tag = "3")]
    pub hash: String,
    #[prost(string, tag = "4")]
    pub from: String,
}

// Integer amounts are decimal strings; signature values are minimal
// big-endian bytes.

#[derive(Clone, PartialEq, Message)]
pub struct LegacyTx {
    #[prost(uint64, tag = "1")]
    pub nonce: u64,
    #[prost(string, tag = "2")]
    pub gas_price: String,
    #[prost(uint64, tag = "3")]
    pub gas: u64,
    #[prost(string, tag = "4")]
    pub to: String,
    #[prost(string, tag = "5")]
    pub value: String,
    #[prost(bytes = "vec", tag = "6")]
    pub data: Vec<u8>,
    #[prost(bytes = "vec", tag = "7")]
    pub v: Vec<u8>,
    #[prost(bytes = "vec", tag = "8")]
    pub r: Vec<u8>,
    #[prost(bytes = "vec", tag = "9")]
    pub s: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AccessListTx {
    #[prost(string, tag = "1")]
    pub chain_id: String,
    #[prost(uint64, tag = "2")]
    pub nonce: u64,
    #[prost(string, tag = "3")]
    pub gas_price: String,
    #[prost(uint64, tag = "4")]
    pub gas: u64,
    #[prost(string, tag = "5")]
    pub to: String,
    #[prost(string, tag = "6")]
    pub value: String,
    #[prost(bytes = "vec", tag = "7")]
    pub data: Vec<u8>,
    #[prost(message, repeated, tag = "8")]
    pub accesses: Vec<AccessTuple>,
    #[prost(bytes = "vec", tag = "9")]
    pub v: Vec<u8>,
    #[prost(bytes = "vec", tag = "10")]
    pub r: Vec<u8>,
    #[prost(bytes = "vec", tag = "11")]
    pub s: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DynamicFeeTx {
    #[prost(string, tag = "1")]
    pub chain_id: String,
    #[prost(uint64, tag = "2")]
    pub nonce: u64,
    #[prost(string, tag = "3")]
    pub gas_tip_cap: String,
    #[prost(string, tag = "4")]
    pub gas_fee_cap: String,
    #[prost(uint64, tag = "5")]
    pub gas: u64,
    #[prost(string, tag = "6")]
    pub to: String,
    #[prost(string, tag = "7")]
    pub value: String,
    #[prost(bytes = "vec", tag = "8")]
    pub data: Vec<u8>,
    #[prost(message, repeated, tag = "9")]
    pub accesses: Vec<AccessTuple>,
    #[prost(bytes = "vec", tag = "10")]
    pub v: Vec<u8>,
    #[prost(bytes = "vec", tag = "11")]
    pub r: Vec<u8>,
    #[prost(bytes = "vec", tag = "12")]
    pub s: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AccessTuple {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(string, repeated, tag = "2")]
    pub storage_keys: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ExtensionOptionsEthereumTx {}

// Queries

#[derive(Clone, PartialEq, Message)]
pub struct QueryAccountRequest {
    #[prost(string, tag = "1")]
    pub address: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryAccountResponse {
    #[prost(message, optional, tag = "1")]
    pub account: Option<Any>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BaseAccount {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, optional, tag = "2")]
    pub pub_key: Option<Any>,
    #[prost(uint64, tag = "3")]
    pub account_number: u64,
    #[prost(uint64, tag = "4")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct EthAccount {
    #[prost(message, optional, tag = "1")]
    pub base_account: Option<BaseAccount>,
    #[prost(string, tag = "2")]
    pub code_hash: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryBaseFeeRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct QueryBaseFeeResponse {
    #[prost(string, tag = "1")]
    pub base_fee: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryFeeMarketParamsRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct QueryFeeMarketParamsResponse {
    #[prost(message, optional, tag = "1")]
    pub params: Option<FeeMarketParams>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FeeMarketParams {
    #[prost(bool, tag = "1")]
    pub no_base_fee: bool,
    #[prost(uint32, tag = "2")]
    pub base_fee_change_denominator: u32,
    #[prost(uint32, tag = "3")]
    pub elasticity_multiplier: u32,
}
