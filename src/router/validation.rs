// Transfer request validation module
// Checks addresses, token ids and chain keys for the source and destination
// chain formats before a quote is requested
//
// Numan Thabit 2025 Nov

use crate::errors::FetchError;
use crate::router::routes::TransferRequest;

const SOLANA_CHAIN_KEY: &str = "solana";

/// Stargate chain keys whose accounts and tokens are 20-byte EVM addresses
const EVM_CHAIN_KEYS: &[&str] = &[
    "ethereum", "arbitrum", "optimism", "base", "polygon", "bsc", "avalanche", "mantle",
    "linea", "scroll", "metis", "kava", "klaytn", "sei", "taiko", "iota", "flare", "gravity",
    "rarible", "aurora", "abstract", "berachain", "soneium", "sonic", "unichain", "hemi",
    "plume", "zkconsensys", "fuse", "xlayer", "coredao", "manta", "mode", "blast",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressFormat {
    Evm,
    Solana,
}

/// Address format of a chain key, `None` for chains we cannot check locally.
fn address_format(chain_key: &str) -> Option<AddressFormat> {
    let key = chain_key.trim();
    if key.eq_ignore_ascii_case(SOLANA_CHAIN_KEY) {
        Some(AddressFormat::Solana)
    } else if EVM_CHAIN_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k)) {
        Some(AddressFormat::Evm)
    } else {
        None
    }
}

/// Validation result accumulating every problem found
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn into_result(self) -> Result<(), FetchError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(FetchError::InvalidRequest(self.errors.join("; ")))
        }
    }
}

/// Validate a transfer request against the address format of each chain.
pub fn validate_transfer_request(req: &TransferRequest) -> ValidationResult {
    let mut result = ValidationResult::new();

    for (field, key) in [
        ("srcChainKey", &req.src_chain_key),
        ("dstChainKey", &req.dst_chain_key),
    ] {
        if key.trim().is_empty() {
            result.add_error(format!("{field} is empty"));
        }
    }

    check_identifier(&mut result, "srcToken", &req.src_token, &req.src_chain_key);
    check_identifier(&mut result, "srcAddress", &req.src_address, &req.src_chain_key);
    check_identifier(&mut result, "dstToken", &req.dst_token, &req.dst_chain_key);
    check_identifier(&mut result, "dstAddress", &req.dst_address, &req.dst_chain_key);

    result
}

fn check_identifier(result: &mut ValidationResult, field: &str, value: &str, chain_key: &str) {
    if value.is_empty() {
        result.add_error(format!("{field} is empty"));
        return;
    }
    // unknown chains are left to the quote service
    let ok = match address_format(chain_key) {
        Some(AddressFormat::Solana) => is_solana_pubkey(value),
        Some(AddressFormat::Evm) => is_evm_address(value),
        None => true,
    };
    if !ok {
        result.add_error(format!(
            "{field} {value} is not a valid address for chain {chain_key}"
        ));
    }
}

/// `0x` followed by 40 hex digits
pub fn is_evm_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// base58 encoding of 32 bytes
pub fn is_solana_pubkey(value: &str) -> bool {
    bs58::decode(value)
        .into_vec()
        .is_ok_and(|bytes| bytes.len() == 32)
}
