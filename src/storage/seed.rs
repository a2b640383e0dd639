//! Standard field catalog, seeded at store initialization.
//!
//! Field ids 1..26 are reserved; their `field_key`, `field_id`, and
//! `data_type` are immutable. Custom fields start at id 27.

use crate::domain::enums::{DataType, Operator};

pub const STANDARD_FIELD_MAX_ID: i32 = 26;

pub struct StandardField {
    pub field_key: &'static str,
    pub field_id: i32,
    pub display_name: &'static str,
    pub data_type: DataType,
    pub allowed_operators: &'static [Operator],
    pub multi_value_allowed: bool,
    pub is_sensitive: bool,
}

use DataType::*;
use Operator::*;

const EQUALITY: &[Operator] = &[Eq, Ne];
const MEMBERSHIP: &[Operator] = &[Eq, Ne, In, NotIn];
const NUMERIC: &[Operator] = &[Eq, Ne, Gt, Gte, Lt, Lte, Between];
const TEMPORAL: &[Operator] = &[Gt, Gte, Lt, Lte, Between];
const TEXTUAL: &[Operator] = &[Eq, Contains, NotContains, StartsWith, EndsWith, Regex];

pub const STANDARD_FIELDS: &[StandardField] = &[
    StandardField { field_key: "transaction_id", field_id: 1, display_name: "Transaction ID", data_type: String, allowed_operators: EQUALITY, multi_value_allowed: false, is_sensitive: false },
    StandardField { field_key: "transaction_type", field_id: 2, display_name: "Transaction Type", data_type: Enum, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "amount", field_id: 3, display_name: "Transaction Amount (minor units)", data_type: Number, allowed_operators: NUMERIC, multi_value_allowed: false, is_sensitive: false },
    StandardField { field_key: "currency", field_id: 4, display_name: "Currency Code", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "card_number_hash", field_id: 5, display_name: "Card Number Hash", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: true },
    StandardField { field_key: "card_bin", field_id: 6, display_name: "Card BIN", data_type: String, allowed_operators: &[Eq, Ne, In, NotIn, StartsWith], multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "card_network", field_id: 7, display_name: "Card Network", data_type: Enum, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "card_issuer_country", field_id: 8, display_name: "Card Issuer Country", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "merchant_id", field_id: 9, display_name: "Merchant ID", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "merchant_name", field_id: 10, display_name: "Merchant Name", data_type: String, allowed_operators: TEXTUAL, multi_value_allowed: false, is_sensitive: false },
    StandardField { field_key: "merchant_country", field_id: 11, display_name: "Merchant Country", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "mcc", field_id: 12, display_name: "Merchant Category Code", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "terminal_id", field_id: 13, display_name: "Terminal ID", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "pos_entry_mode", field_id: 14, display_name: "POS Entry Mode", data_type: Enum, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "billing_address_line1", field_id: 15, display_name: "Billing Address Line 1", data_type: String, allowed_operators: TEXTUAL, multi_value_allowed: false, is_sensitive: true },
    StandardField { field_key: "billing_city", field_id: 16, display_name: "Billing City", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "billing_postal_code", field_id: 17, display_name: "Billing Postal Code", data_type: String, allowed_operators: &[Eq, Ne, In, NotIn, StartsWith], multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "billing_country", field_id: 18, display_name: "Billing Country", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "shipping_address_line1", field_id: 19, display_name: "Shipping Address Line 1", data_type: String, allowed_operators: TEXTUAL, multi_value_allowed: false, is_sensitive: true },
    StandardField { field_key: "shipping_city", field_id: 20, display_name: "Shipping City", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "shipping_postal_code", field_id: 21, display_name: "Shipping Postal Code", data_type: String, allowed_operators: &[Eq, Ne, In, NotIn, StartsWith], multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "shipping_country", field_id: 22, display_name: "Shipping Country", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: false },
    StandardField { field_key: "device_fingerprint", field_id: 23, display_name: "Device Fingerprint", data_type: String, allowed_operators: MEMBERSHIP, multi_value_allowed: true, is_sensitive: true },
    StandardField { field_key: "device_ip", field_id: 24, display_name: "Device IP Address", data_type: String, allowed_operators: &[Eq, Ne, In, NotIn, StartsWith], multi_value_allowed: true, is_sensitive: true },
    StandardField { field_key: "is_recurring", field_id: 25, display_name: "Recurring Transaction", data_type: Boolean, allowed_operators: &[Eq], multi_value_allowed: false, is_sensitive: false },
    StandardField { field_key: "transaction_timestamp", field_id: 26, display_name: "Transaction Timestamp", data_type: Date, allowed_operators: TEMPORAL, multi_value_allowed: false, is_sensitive: false },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_standard_fields_cover_reserved_ids_exactly() {
        let ids: HashSet<i32> = STANDARD_FIELDS.iter().map(|f| f.field_id).collect();
        assert_eq!(ids.len(), STANDARD_FIELDS.len());
        assert_eq!(STANDARD_FIELDS.len() as i32, STANDARD_FIELD_MAX_ID);
        assert_eq!(ids.iter().min(), Some(&1));
        assert_eq!(ids.iter().max(), Some(&STANDARD_FIELD_MAX_ID));
    }

    #[test]
    fn test_field_keys_unique() {
        let keys: HashSet<&str> = STANDARD_FIELDS.iter().map(|f| f.field_key).collect();
        assert_eq!(keys.len(), STANDARD_FIELDS.len());
    }

    #[test]
    fn test_multi_value_fields_allow_membership_operators() {
        for field in STANDARD_FIELDS {
            if field.allowed_operators.contains(&Operator::In) {
                assert!(
                    field.multi_value_allowed,
                    "{} allows IN but not multi-value",
                    field.field_key
                );
            }
        }
    }
}
