use alloy::primitives::Address;
use bigdecimal::{num_bigint::BigInt, BigDecimal, ToPrimitive};

/// Splits `(a,b),(c,d)` into `["a,b", "c,d"]`.
pub fn parse_tuple_string(data: String) -> Vec<String> {
    let data = data.trim();
    if data.is_empty() {
        return vec![];
    }

    let str = &data[1..];
    let splited = str.split(",(");
    let mut items: Vec<String> = Vec::new();

    for c in splited {
        if let Some(index) = c.find(')') {
            let tuple_data = &c[0..index];
            items.push(tuple_data.trim().to_owned());
        }
    }

    items
}

/// Display form of a chain identifier, `arbitrum` -> `Arbitrum`.
pub fn format_chain(chain: &str) -> String {
    let mut chars = chain.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        },
        None => String::new(),
    }
}

pub fn lower_hex(address: &Address) -> String {
    address.to_string().to_lowercase()
}

/// Moves a raw fixed-point integer into plain units, `raw / 10^decimals`.
pub fn scale_amount(raw: &BigDecimal, decimals: u8) -> f64 {
    let unit = BigDecimal::new(BigInt::from(1), i64::from(decimals));
    (raw * unit).to_f64().unwrap_or(f64::NAN)
}
