use crate::{
    bridge::{
        from_middleware_error,
        from_rpc_error,
    },
    deployment::NetworkDescriptor,
    provider::{
        UNRECOGNIZED_CHAIN_CODE,
        WalletError,
        WalletProvider,
    },
};
use async_trait::async_trait;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use ethers::{
    middleware::SignerMiddleware,
    providers::{
        Http,
        Middleware,
        Provider,
    },
    signers::{
        LocalWallet,
        Signer,
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
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        RwLock,
    },
};
use tracing::info;

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

#[derive(Clone, Debug)]
pub struct KeystoreDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl KeystoreDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_keystore_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".ethereum").join("keystore"))
}

pub fn resolve_keystore_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_keystore_dir(),
    }
}

/// Keystore files in `dir`, named by file stem and sorted.
pub fn list_keystores(dir: &Path) -> Result<Vec<KeystoreDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut keystores = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        if name.starts_with('.') {
            continue;
        }
        keystores.push(KeystoreDescriptor::new(name, path));
    }
    keystores.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(keystores)
}

pub fn find_keystore(dir: &Path, name: &str) -> Result<KeystoreDescriptor> {
    list_keystores(dir)?
        .into_iter()
        .find(|k| k.name == name)
        .ok_or_else(|| eyre!("Keystore '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_keystore(descriptor: &KeystoreDescriptor) -> Result<LocalWallet> {
    let prompt = format!("Enter password for keystore '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read keystore password")?;
    unlock_keystore_with_password(descriptor, &password)
}

pub fn unlock_keystore_with_password(
    descriptor: &KeystoreDescriptor,
    password: &str,
) -> Result<LocalWallet> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for keystore '{}'", descriptor.name))?;
    LocalWallet::from_bytes(&secret).map_err(|_| {
        eyre!(
            "Keystore '{}' contained unsupported key material",
            descriptor.name
        )
    })
}

/// A local signing wallet that plays the role of an injected provider.
///
/// The account list is the single unlocked key. Switching only succeeds when
/// the current RPC already serves the requested chain; otherwise it answers with
/// the unrecognized-chain code so the caller adds the network, which re-points
/// the wallet at the descriptor's RPC.
#[derive(Debug)]
pub struct KeystoreWallet {
    client: RwLock<Arc<SignerClient>>,
}

impl KeystoreWallet {
    pub async fn connect(wallet: LocalWallet, rpc_url: &str) -> Result<Self> {
        let client = signer_client(wallet, rpc_url).await?;
        info!(account = ?client.address(), rpc_url, "keystore wallet ready");
        Ok(Self {
            client: RwLock::new(Arc::new(client)),
        })
    }

    fn client(&self) -> Arc<SignerClient> {
        let guard = self.client.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    fn replace(&self, client: SignerClient) {
        let mut guard = self.client.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(client);
    }
}

async fn signer_client(wallet: LocalWallet, rpc_url: &str) -> Result<SignerClient> {
    let provider = Provider::<Http>::try_from(rpc_url)
        .wrap_err_with(|| format!("Invalid RPC URL {rpc_url}"))?;
    SignerMiddleware::new_with_provider_chain(provider, wallet)
        .await
        .map_err(|err| eyre!("Failed to read chain id from {rpc_url}: {err}"))
}

#[async_trait]
impl WalletProvider for KeystoreWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.client().address()])
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.client().address()])
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let client = self.client();
        let id = client
            .provider()
            .get_chainid()
            .await
            .map_err(|err| from_rpc_error(&err))?;
        if id > U256::from(u64::MAX) {
            return Err(WalletError::Malformed(format!("chain id {id} out of range")));
        }
        Ok(id.as_u64())
    }

    async fn switch_network(&self, chain_id_hex: &str) -> Result<(), WalletError> {
        let target = u64::from_str_radix(chain_id_hex.trim_start_matches("0x"), 16)
            .map_err(|_| WalletError::rpc(-32602, format!("invalid chain id {chain_id_hex}")))?;
        let current = self.chain_id().await?;
        if current != target {
            return Err(WalletError::rpc(
                UNRECOGNIZED_CHAIN_CODE,
                format!("Unrecognized chain ID {chain_id_hex}"),
            ));
        }
        let client = self.client();
        let wallet = client.signer().clone().with_chain_id(target);
        self.replace(SignerMiddleware::new(client.provider().clone(), wallet));
        Ok(())
    }

    async fn add_network(&self, network: &NetworkDescriptor) -> Result<(), WalletError> {
        let wallet = self.client().signer().clone();
        let client = signer_client(wallet, &network.rpc_url)
            .await
            .map_err(|err| WalletError::Unavailable(err.to_string()))?;
        if client.signer().chain_id() != network.chain_id {
            return Err(WalletError::rpc(
                -32603,
                format!(
                    "{} serves chain {}, expected {}",
                    network.rpc_url,
                    client.signer().chain_id(),
                    network.chain_id
                ),
            ));
        }
        info!(chain_id = network.chain_id, rpc_url = %network.rpc_url, "keystore wallet re-pointed");
        self.replace(client);
        Ok(())
    }

    async fn balance(&self, account: Address) -> Result<U256, WalletError> {
        self.client()
            .provider()
            .get_balance(account, None)
            .await
            .map_err(|err| from_rpc_error(&err))
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, WalletError> {
        let typed: TypedTransaction = tx.clone().into();
        self.client()
            .provider()
            .call(&typed, None)
            .await
            .map_err(|err| from_rpc_error(&err))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, WalletError> {
        let client = self.client();
        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|err| from_middleware_error(&err))?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        self.client()
            .provider()
            .get_transaction_receipt(hash)
            .await
            .map_err(|err| from_rpc_error(&err))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    const SECRET: [u8; 32] = [7u8; 32];

    #[test]
    fn list_keystores__skips_directories_and_sorts_by_name() {
        // given
        let dir = TempDir::new("keystores").unwrap();
        fs::write(dir.path().join("bob.json"), b"{}").unwrap();
        fs::write(dir.path().join("alice.json"), b"{}").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        // when
        let names: Vec<_> = list_keystores(dir.path())
            .unwrap()
            .into_iter()
            .map(|k| k.name)
            .collect();

        // then
        assert_eq!(names, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn find_keystore__errors_when_missing() {
        let dir = TempDir::new("keystores").unwrap();
        let err = find_keystore(dir.path(), "ghost").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn list_keystores__treats_missing_dir_as_empty() {
        let dir = TempDir::new("keystores").unwrap();
        assert!(list_keystores(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn unlock_keystore_with_password__recovers_signing_key() {
        // given
        let dir = TempDir::new("keystores").unwrap();
        let mut rng = ethers::core::rand::thread_rng();
        eth_keystore::encrypt_key(dir.path(), &mut rng, SECRET, "hunter2", Some("player"))
            .unwrap();
        let descriptor = find_keystore(dir.path(), "player").unwrap();

        // when
        let wallet = unlock_keystore_with_password(&descriptor, "hunter2").unwrap();

        // then
        let expected = LocalWallet::from_bytes(&SECRET).unwrap();
        assert_eq!(wallet.address(), expected.address());
        assert!(unlock_keystore_with_password(&descriptor, "wrong").is_err());
    }

    #[test]
    fn resolve_keystore_dir__expands_tilde() {
        let home = std::env::var("HOME").unwrap();
        let resolved = resolve_keystore_dir(Some("~/keys")).unwrap();
        assert_eq!(resolved, PathBuf::from(home).join("keys"));
    }
}
