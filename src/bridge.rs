use crate::{
    deployment::NetworkDescriptor,
    provider::{
        WalletError,
        WalletProvider,
    },
};
use async_trait::async_trait;
use ethers::{
    providers::{
        Http,
        Middleware,
        MiddlewareError,
        Provider,
        RpcError,
    },
    types::{
        Address,
        Bytes,
        H256,
        TransactionReceipt,
        TransactionRequest,
        U256,
        transaction::eip2718::TypedTransaction,
    },
};
use serde_json::{
    Value,
    json,
};
use tracing::debug;

/// A wallet reached over EIP-1193 JSON-RPC, e.g. a browser-extension bridge or a
/// node with unlocked accounts. Every request is forwarded verbatim so the wallet
/// owns prompting, signing and its own network list.
#[derive(Clone, Debug)]
pub struct Eip1193Bridge {
    provider: Provider<Http>,
    url: String,
}

impl Eip1193Bridge {
    pub fn connect(url: &str) -> Result<Self, WalletError> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|err| WalletError::Unavailable(format!("{url}: {err}")))?;
        Ok(Self {
            provider,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T>(&self, method: &str, params: Value) -> Result<T, WalletError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + std::fmt::Debug + Send,
    {
        debug!(method, "wallet request");
        self.provider
            .request(method, params)
            .await
            .map_err(|err| from_rpc_error(&err))
    }
}

#[async_trait]
impl WalletProvider for Eip1193Bridge {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.request("eth_requestAccounts", json!([])).await
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.request("eth_accounts", json!([])).await
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let id = self
            .provider
            .get_chainid()
            .await
            .map_err(|err| from_rpc_error(&err))?;
        if id > U256::from(u64::MAX) {
            return Err(WalletError::Malformed(format!("chain id {id} out of range")));
        }
        Ok(id.as_u64())
    }

    async fn switch_network(&self, chain_id_hex: &str) -> Result<(), WalletError> {
        let _: Value = self
            .request("wallet_switchEthereumChain", json!([{ "chainId": chain_id_hex }]))
            .await?;
        Ok(())
    }

    async fn add_network(&self, network: &NetworkDescriptor) -> Result<(), WalletError> {
        let _: Value = self
            .request("wallet_addEthereumChain", json!([network.add_chain_params()]))
            .await?;
        Ok(())
    }

    async fn balance(&self, account: Address) -> Result<U256, WalletError> {
        self.provider
            .get_balance(account, None)
            .await
            .map_err(|err| from_rpc_error(&err))
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, WalletError> {
        let typed: TypedTransaction = tx.clone().into();
        self.provider
            .call(&typed, None)
            .await
            .map_err(|err| from_rpc_error(&err))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, WalletError> {
        self.request("eth_sendTransaction", json!([tx])).await
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|err| from_rpc_error(&err))
    }
}

/// Keeps the JSON-RPC error code so callers can tell a user rejection from a node failure.
pub(crate) fn from_rpc_error<E: RpcError>(err: &E) -> WalletError {
    if let Some(response) = err.as_error_response() {
        return WalletError::rpc(response.code, response.message.clone());
    }
    if let Some(serde_err) = err.as_serde_error() {
        return WalletError::Malformed(serde_err.to_string());
    }
    WalletError::Unavailable(err.to_string())
}

pub(crate) fn from_middleware_error<E: MiddlewareError>(err: &E) -> WalletError {
    if let Some(response) = err.as_error_response() {
        return WalletError::rpc(response.code, response.message.clone());
    }
    if let Some(serde_err) = err.as_serde_error() {
        return WalletError::Malformed(serde_err.to_string());
    }
    WalletError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use ethers::providers::{
        HttpClientError,
        JsonRpcError,
    };

    #[test]
    fn from_rpc_error__keeps_wallet_error_code() {
        // given
        let err = HttpClientError::JsonRpcError(JsonRpcError {
            code: 4001,
            message: "User rejected the request.".to_string(),
            data: None,
        });

        // when
        let mapped = from_rpc_error(&err);

        // then
        assert!(mapped.is_user_rejection());
        assert_eq!(
            mapped,
            WalletError::rpc(4001, "User rejected the request.")
        );
    }

    #[test]
    fn from_rpc_error__reports_unrecognized_chain() {
        let err = HttpClientError::JsonRpcError(JsonRpcError {
            code: 4902,
            message: "Unrecognized chain ID".to_string(),
            data: None,
        });
        assert!(from_rpc_error(&err).is_unrecognized_chain());
    }

    #[test]
    fn connect__rejects_unparseable_url() {
        let result = Eip1193Bridge::connect("not a url");
        assert!(matches!(result, Err(WalletError::Unavailable(_))));
    }
}
