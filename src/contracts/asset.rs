use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::utils::bigint_string;

/// Identity of a tradable asset: a bank denom or a cw20 contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetInfo {
    Token { contract_addr: String },
    NativeToken { denom: String },
}

impl AssetInfo {
    pub fn native(denom: &str) -> Self {
        AssetInfo::NativeToken { denom: denom.to_string() }
    }

    pub fn token(contract_addr: &str) -> Self {
        AssetInfo::Token { contract_addr: contract_addr.to_string() }
    }

    /// Bank denom or cw20 contract address.
    pub fn denom(&self) -> &str {
        match self {
            AssetInfo::Token { contract_addr } => contract_addr,
            AssetInfo::NativeToken { denom } => denom,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetInfo::NativeToken { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub info: AssetInfo,
    #[serde(with = "bigint_string")]
    pub amount: BigInt,
}

/// Bank coin as carried in message funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "bigint_string")]
    pub amount: BigInt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_info_wire_format() {
        let token: AssetInfo =
            serde_json::from_str(r#"{"token":{"contract_addr":"orai1abc"}}"#).unwrap();
        assert_eq!(token.denom(), "orai1abc");
        assert!(!token.is_native());

        let native: AssetInfo = serde_json::from_str(r#"{"native_token":{"denom":"orai"}}"#).unwrap();
        assert_eq!(native, AssetInfo::native("orai"));
        assert_eq!(
            serde_json::to_string(&native).unwrap(),
            r#"{"native_token":{"denom":"orai"}}"#
        );
    }
}
