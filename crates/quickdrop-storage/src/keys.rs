//! Storage key generation.

use quickdrop_core::constants::STORAGE_KEY_PREFIX;
use quickdrop_core::PickupCode;

/// Generate the storage key for a file of the item registered under `code`.
pub fn generate_storage_key(code: &PickupCode, display_name: &str) -> String {
    format!("{}{}_{}", STORAGE_KEY_PREFIX, code, display_name)
}
