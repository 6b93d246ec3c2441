//! Wallet address syntax checks. No network or storage access.

const ADDRESS_HEX_LEN: usize = 40;

/// Accepts `0x` followed by exactly 40 hex digits, either case.
pub fn is_valid(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex) => hex.len() == ADDRESS_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Stored form of an address. Hex digits are case-insensitive, so every
/// casing of one address maps to the same wallet.
pub fn normalize(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}
