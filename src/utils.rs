//! Identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

pub const ORDER_HRP: &str = "order_";

// time-ordered uuid7 wrapped in bech32 under a human readable prefix
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub fn new_order_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(ORDER_HRP)
}
