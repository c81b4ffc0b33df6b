/// Reserved username for the sole treasury (SYSTEM-role) user. Its wallets are
/// the source of TOP_UP/BONUS and the destination of PURCHASE for each asset type.
pub const TREASURY_USERNAME: &str = "treasury";

/// Reserved username for the void (SYSTEM-role) user. Its wallets exist only
/// as the debit counterparty for genesis minting, so the genesis transaction
/// still has exactly two ledger entries (§9's resolved open question) instead
/// of special-casing a single-entry self-transfer.
pub const VOID_USERNAME: &str = "void";

pub fn genesis_idempotency_key(asset_type_code: &str) -> String {
    format!("genesis-treasury-{asset_type_code}")
}

pub fn seed_idempotency_key(username: &str, asset_type_code: &str) -> String {
    format!("seed-{username}-{asset_type_code}")
}
