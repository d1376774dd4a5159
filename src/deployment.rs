use crate::amount::Decimals;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use ethers::types::Address;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::Path,
    str::FromStr,
};

pub const MINTME_CHAIN_ID: u64 = 0x609E;
pub const MINTME_RPC_URL: &str = "https://node.1000x.ch";
pub const MINTME_EXPLORER_URL: &str = "https://mintme.com/explorer/";

const COIN_FLIP_ADDRESS: &str = "0xD0C7284587945991dc4363633Ac7fDf8AbbB5c15";
const SLOTS_ADDRESS: &str = "0x8D342583bCD90d725528be03A1b6BBD4A8310faE";
const SWAP_ADDRESS: &str = "0x2FD24cd741dA1789A4827a0AA8549145708c1B34";
const RANGER_TOKEN_ADDRESS: &str = "0x5fed7eb4b29e9b2e2758ac40c9ec4b4e67098192";

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: Decimals,
}

/// Everything a wallet needs to add the network, and everything we need to require it.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_url: String,
    pub explorer_url: String,
}

impl NetworkDescriptor {
    pub fn mintme() -> Self {
        Self {
            chain_id: MINTME_CHAIN_ID,
            chain_name: "MINTME Network".to_string(),
            native_currency: NativeCurrency {
                name: "MintMe".to_string(),
                symbol: "MINTME".to_string(),
                decimals: Decimals::NATIVE,
            },
            rpc_url: MINTME_RPC_URL.to_string(),
            explorer_url: MINTME_EXPLORER_URL.to_string(),
        }
    }

    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// `wallet_addEthereumChain` parameter object.
    pub fn add_chain_params(&self) -> serde_json::Value {
        serde_json::json!({
            "chainId": self.chain_id_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals.get(),
            },
            "rpcUrls": [self.rpc_url],
            "blockExplorerUrls": [self.explorer_url],
        })
    }
}

/// A game contract and the scale its bets are denominated in.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct GameContract {
    pub address: Address,
    pub decimals: Decimals,
    /// Fixed bet choices in whole units; empty means any amount up to the contract maximum.
    #[serde(default)]
    pub presets: Vec<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct TokenContract {
    pub address: Address,
    pub decimals: Decimals,
    pub symbol: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SwapContract {
    pub address: Address,
}

/// Fixed gas ceiling per transaction kind; nothing is estimated.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct GasCeilings {
    pub play: u64,
    pub spin: u64,
    pub approve: u64,
    pub swap: u64,
    pub add_liquidity: u64,
}

impl Default for GasCeilings {
    fn default() -> Self {
        Self {
            play: 300_000,
            spin: 300_000,
            approve: 100_000,
            swap: 250_000,
            add_liquidity: 300_000,
        }
    }
}

/// The network plus the contract descriptors the gateway is built from.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Deployment {
    pub network: NetworkDescriptor,
    pub coin_flip: GameContract,
    pub slots: GameContract,
    pub token: TokenContract,
    pub swap: SwapContract,
    #[serde(default)]
    pub gas: GasCeilings,
}

impl Deployment {
    pub fn mintme() -> Self {
        Self {
            network: NetworkDescriptor::mintme(),
            coin_flip: GameContract {
                address: known_address(COIN_FLIP_ADDRESS),
                decimals: Decimals::NATIVE,
                presets: Vec::new(),
            },
            slots: GameContract {
                address: known_address(SLOTS_ADDRESS),
                decimals: Decimals::REWARD_TOKEN,
                presets: vec![1, 5, 10, 25, 50, 100],
            },
            token: TokenContract {
                address: known_address(RANGER_TOKEN_ADDRESS),
                decimals: Decimals::REWARD_TOKEN,
                symbol: "RANGER".to_string(),
            },
            swap: SwapContract {
                address: known_address(SWAP_ADDRESS),
            },
            gas: GasCeilings::default(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).wrap_err_with(|| {
            format!("Failed to read deployment file {}", path.display())
        })?;
        serde_json::from_slice(&data).wrap_err_with(|| {
            format!("Failed to parse deployment file {}", path.display())
        })
    }
}

fn known_address(raw: &str) -> Address {
    Address::from_str(raw).unwrap_or_default()
}
