//! Network and asset tables
//!
//! Maps friendly network names to chain identifiers and USDC contract
//! addresses. Unknown networks pass through unchanged and get the 6-decimal
//! USDC default, so operators can point routes at networks this table has
//! not caught up with yet.

/// Metadata for a network's payment asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetInfo {
    /// Asset name as it appears in the challenge `extra` block
    pub name: &'static str,
    /// EIP-712 domain version of the asset contract
    pub version: &'static str,
    /// Number of decimals the asset supports
    pub decimals: u32,
}

const USDC: AssetInfo = AssetInfo {
    name: "USDC",
    version: "2",
    decimals: 6,
};

/// Resolve a friendly network name to its chain identifier.
///
/// Already-resolved identifiers and unknown networks pass through unchanged.
pub fn chain_id(network: &str) -> &str {
    match network {
        "base" => "eip155:8453",
        "base-sepolia" => "eip155:84532",
        "avalanche" => "eip155:43114",
        "avalanche-fuji" => "eip155:43113",
        "solana" => "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
        "solana-devnet" => "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        other => other,
    }
}

/// USDC contract address for a network, accepted by friendly name or chain
/// identifier. Unknown networks return an empty address.
pub fn asset_address(network: &str) -> &'static str {
    match network {
        "base" | "eip155:8453" => "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        "base-sepolia" | "eip155:84532" => "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        "avalanche" | "eip155:43114" => "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
        "avalanche-fuji" | "eip155:43113" => "0x5425890298aed601595a70AB815c96711a31Bc65",
        "solana" | "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp" => {
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
        }
        "solana-devnet" | "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1" => {
            "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"
        }
        _ => "",
    }
}

/// Asset metadata for a chain identifier; unknown chains default to USDC
/// with 6 decimals.
pub fn asset_info(chain_id: &str) -> AssetInfo {
    match chain_id {
        "eip155:8453" | "eip155:84532" | "eip155:43114" | "eip155:43113" => USDC,
        "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp" | "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1" => {
            USDC
        }
        _ => USDC,
    }
}
