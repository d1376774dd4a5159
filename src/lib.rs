pub mod amount;

pub mod arcade;

pub mod balance;

pub mod bridge;

pub mod deployment;

pub mod error;

pub mod executor;

pub mod gateway;

pub mod history;

pub mod keystore;

pub mod network;

pub mod provider;

pub mod session;

pub mod store;

pub mod surface;

pub mod test_helpers;

pub mod coin_flip_types {
    use ethers::contract::abigen;

    abigen!(
        CoinFlip,
        r#"[
            function Play() payable
            function MaxAmountToBet() view returns (uint256)
            function getGameCount() view returns (uint256)
            function getGameEntry(uint256 index) view returns (address addr, uint256 blocknumber, uint256 blocktimestamp, uint256 bet, uint256 prize, bool winner)
            event CoinFlipped(string message, address user, uint256 amount, bool winner)
        ]"#
    );
}

pub mod slots_types {
    use ethers::contract::abigen;

    abigen!(
        Slots,
        r#"[
            function spin(uint256 amount)
            function maxBetAmount() view returns (uint256)
            function getGameCount() view returns (uint256)
            function getGameEntry(uint256 index) view returns (address addr, uint256 blocknumber, uint256 blocktimestamp, uint256 bet, uint256 prize, bool winner)
            event Spin(string message, address user, uint256 amount, bool winner)
        ]"#
    );
}

pub mod swap_types {
    use ethers::contract::abigen;

    abigen!(
        RangerSwap,
        r#"[
            function addLiquidity(uint256 tokenAmount) payable
            function swapRangerToMintMe(uint256 amount)
            function swapMintMeToRanger(uint256 amount) payable
            event Swapped(address user, uint256 amountIn, uint256 amountOut)
            event LiquidityAdded(address provider, uint256 tokenAmount, uint256 nativeAmount)
        ]"#
    );
}

pub mod erc20_types {
    use ethers::contract::abigen;

    abigen!(
        RangerToken,
        r#"[
            function balanceOf(address account) view returns (uint256)
            function decimals() view returns (uint8)
            function allowance(address owner, address spender) view returns (uint256)
            function approve(address spender, uint256 amount) returns (bool)
            event Approval(address indexed owner, address indexed spender, uint256 value)
        ]"#
    );
}
