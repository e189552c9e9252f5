//! Identifier codec for scanned warehouse tags.
//!
//! Physical labels encode the owning entity's key inside the printed
//! identifier (`BOX_<orderKey>_<seq>`). Internally the relationship lives in
//! an explicit foreign-key column; this codec is the ingestion shim that
//! canonicalizes scanner input and recovers keys from legacy identifiers,
//! never the source of truth.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

pub const BOX_PREFIX: &str = "BOX";
pub const CRATE_PREFIX: &str = "CRATE";
pub const PALLET_PREFIX: &str = "PALLET";
pub const SHELF_PREFIX: &str = "SHELF";

/// `PREFIX_<36-char key>[_<seq>]`, case-insensitive, with tolerance for
/// scanner noise between tokens (runs of `-`, `_` or whitespace).
static SCANNED_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(box|crate|pallet|shelf)[\s_-]+([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})(?:[\s_-]+(\d+))?\s*$",
    )
    .expect("scanned id pattern")
});

/// Canonical box identifier: the key token is always 36 characters, the
/// optional sequence suffix is 1-based.
static BOX_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^BOX_([0-9a-fA-F-]{36})(?:_(\d+))?$").expect("box id pattern")
});

pub fn encode_box_id(order_key: Uuid, seq: u32) -> String {
    format!("{}_{}_{}", BOX_PREFIX, order_key, seq)
}

pub fn encode_crate_id(order_key: Uuid, seq: u32) -> String {
    format!("{}_{}_{}", CRATE_PREFIX, order_key, seq)
}

pub fn encode_pallet_tag(pallet_key: Uuid) -> String {
    format!("{}_{}", PALLET_PREFIX, pallet_key)
}

pub fn encode_shelf_tag(shelf_key: Uuid) -> String {
    format!("{}_{}", SHELF_PREFIX, shelf_key)
}

/// Extracts the order key embedded in a box identifier.
///
/// Accepts the suffixed (`BOX_<key>_<n>`) and single-box (`BOX_<key>`)
/// forms. Malformed input yields `None`, never a wrong key and never a
/// panic.
pub fn decode_order_from_box_id(box_id: &str) -> Option<Uuid> {
    let caps = BOX_ID.captures(box_id)?;
    Uuid::parse_str(caps.get(1)?.as_str()).ok()
}

/// The 1-based sequence suffix of a box identifier, if present.
pub fn decode_box_seq(box_id: &str) -> Option<u32> {
    let caps = BOX_ID.captures(box_id)?;
    caps.get(2)?.as_str().parse().ok()
}

/// Canonicalizes a raw scanner read into `PREFIX_<key>[_<seq>]` form.
///
/// Uppercases the prefix, lowercases the key token, and collapses the
/// noise separators scanners inject. Input that does not look like a
/// facility tag at all is passed through with whitespace runs collapsed to
/// single underscores, so the result is stable under re-normalization
/// either way.
pub fn normalize_scanned_id(raw: &str) -> String {
    if let Some(caps) = SCANNED_ID.captures(raw) {
        let prefix = caps[1].to_ascii_uppercase();
        let key = caps[2].to_ascii_lowercase();
        match caps.get(3) {
            Some(seq) => format!("{}_{}_{}", prefix, key, seq.as_str()),
            None => format!("{}_{}", prefix, key),
        }
    } else {
        let mut out = String::with_capacity(raw.len());
        let mut in_gap = false;
        for ch in raw.trim().chars() {
            if ch.is_whitespace() || ch == '_' {
                in_gap = true;
            } else {
                if in_gap && !out.is_empty() {
                    out.push('_');
                }
                in_gap = false;
                out.push(ch);
            }
        }
        // Stripping leading separators can expose a valid tag; keep the
        // canonical form the fixed point.
        if SCANNED_ID.is_match(&out) {
            return normalize_scanned_id(&out);
        }
        out
    }
}

/// How a box's owning order was resolved. The variants are ordered by
/// trust: the explicit foreign key wins, the encoded identifier is a
/// compatibility path, and customer linkage is the last resort for boxes
/// created before order-keyed identifiers existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxOwner {
    /// Resolved to a concrete order key.
    Order(Uuid),
    /// No order derivable; the box is linked only through its customer.
    Customer(Uuid),
}

/// Resolves the owning order for a box using the ordered strategy list:
/// explicit `order_id` column, then the encoded identifier (suffixed or
/// not), then the customer link.
pub fn resolve_box_owner(order_id: Option<Uuid>, box_id: &str, customer_id: Uuid) -> BoxOwner {
    if let Some(id) = order_id {
        return BoxOwner::Order(id);
    }
    if let Some(id) = decode_order_from_box_id(box_id) {
        return BoxOwner::Order(id);
    }
    BoxOwner::Customer(customer_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_decode_round_trip() {
        let key = Uuid::new_v4();
        assert_eq!(decode_order_from_box_id(&encode_box_id(key, 3)), Some(key));
        assert_eq!(decode_box_seq(&encode_box_id(key, 3)), Some(3));
    }

    #[test]
    fn unsuffixed_single_box_form_decodes() {
        let key = Uuid::new_v4();
        let single = format!("BOX_{}", key);
        assert_eq!(decode_order_from_box_id(&single), Some(key));
        assert_eq!(decode_box_seq(&single), None);
    }

    #[test]
    fn malformed_input_never_decodes_to_a_key() {
        for bad in [
            "",
            "BOX_",
            "BOX_short_1",
            "CRATE_00000000-0000-0000-0000-000000000000_1",
            "BOX_zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz",
            "BOX_00000000-0000-0000-0000-000000000000_x",
        ] {
            assert_eq!(decode_order_from_box_id(bad), None, "input: {bad:?}");
        }
    }

    #[test]
    fn normalize_cleans_scanner_noise() {
        let key = Uuid::new_v4();
        let noisy = format!("  box -- {}  7 ", key.to_string().to_uppercase());
        assert_eq!(normalize_scanned_id(&noisy), format!("BOX_{}_7", key));
    }

    #[test]
    fn normalize_is_idempotent() {
        let key = Uuid::new_v4();
        for raw in [
            format!("box_{}_2", key),
            format!("SHELF  {}", key),
            "not a tag at   all".to_string(),
            String::new(),
        ] {
            let once = normalize_scanned_id(&raw);
            assert_eq!(normalize_scanned_id(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn owner_resolution_prefers_explicit_key() {
        let order = Uuid::new_v4();
        let other = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let id = encode_box_id(other, 1);

        assert_eq!(
            resolve_box_owner(Some(order), &id, customer),
            BoxOwner::Order(order)
        );
        assert_eq!(
            resolve_box_owner(None, &id, customer),
            BoxOwner::Order(other)
        );
        assert_eq!(
            resolve_box_owner(None, "legacy-tag-0042", customer),
            BoxOwner::Customer(customer)
        );
    }

    proptest! {
        #[test]
        fn round_trip_holds_for_any_key_and_seq(bytes in any::<[u8; 16]>(), seq in 1u32..100_000) {
            let key = Uuid::from_bytes(bytes);
            prop_assert_eq!(decode_order_from_box_id(&encode_box_id(key, seq)), Some(key));
        }

        #[test]
        fn normalize_never_panics_and_is_idempotent(raw in "\\PC{0,64}") {
            let once = normalize_scanned_id(&raw);
            prop_assert_eq!(normalize_scanned_id(&once), once.clone());
        }
    }
}
