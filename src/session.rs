use crate::{
    error::ClientError,
    provider::WalletProvider,
    store::{
        CachedSession,
        SessionStore,
    },
};
use ethers::types::Address;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    atomic::{
        AtomicU64,
        Ordering,
    },
};
use tracing::{
    info,
    warn,
};

/// Capability to authorize transactions for one connected session.
///
/// A new signer is minted on every connect or account change; a signer from an
/// earlier session is never current again.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signer {
    session_id: u64,
    account: Address,
}

impl Signer {
    pub fn account(&self) -> Address {
        self.account
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub account: Address,
    pub chain_id: u64,
    signer: Signer,
}

impl Session {
    pub fn signer(&self) -> &Signer {
        &self.signer
    }
}

pub struct ChainSession {
    wallet: Arc<dyn WalletProvider>,
    store: Option<SessionStore>,
    state: Mutex<Option<Session>>,
    next_id: AtomicU64,
}

impl ChainSession {
    pub fn new(wallet: Arc<dyn WalletProvider>, store: Option<SessionStore>) -> Self {
        Self {
            wallet,
            store,
            state: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn wallet(&self) -> Arc<dyn WalletProvider> {
        Arc::clone(&self.wallet)
    }

    /// Prompts the wallet for account access and persists the chosen account.
    pub async fn connect(&self) -> Result<Session, ClientError> {
        let accounts = self
            .wallet
            .request_accounts()
            .await
            .map_err(|err| ClientError::from_wallet(err, "connect"))?;
        let account = accounts
            .first()
            .copied()
            .ok_or_else(|| ClientError::UserRejected("connect: no account authorized".into()))?;
        let chain_id = self
            .wallet
            .chain_id()
            .await
            .map_err(|err| ClientError::from_wallet(err, "read network"))?;
        let session = self.install(account, chain_id);
        self.persist(|store| store.save(&CachedSession::new(account, chain_id)));
        info!(account = ?account, chain_id, "wallet connected");
        Ok(session)
    }

    /// Re-establishes the cached session without prompting, provided the wallet
    /// still lists the cached account as authorized.
    pub async fn restore(&self) -> Result<Option<Session>, ClientError> {
        let cached = match &self.store {
            Some(store) => match store.load() {
                Ok(cached) => cached,
                Err(err) => {
                    warn!(?err, "ignoring unreadable cached session");
                    None
                }
            },
            None => None,
        };
        let Some(account) = cached.and_then(|c| c.account) else {
            return Ok(None);
        };
        let authorized = self
            .wallet
            .accounts()
            .await
            .map_err(|err| ClientError::from_wallet(err, "restore session"))?;
        if !authorized.contains(&account) {
            info!(account = ?account, "cached account no longer authorized");
            self.persist(SessionStore::clear);
            return Ok(None);
        }
        let chain_id = self
            .wallet
            .chain_id()
            .await
            .map_err(|err| ClientError::from_wallet(err, "read network"))?;
        self.persist(|store| store.save_network(chain_id));
        info!(account = ?account, chain_id, "wallet session restored");
        Ok(Some(self.install(account, chain_id)))
    }

    pub fn disconnect(&self) {
        *self.lock() = None;
        self.persist(SessionStore::clear);
        info!("wallet disconnected");
    }

    pub fn current(&self) -> Option<Session> {
        self.lock().clone()
    }

    pub fn account(&self) -> Option<Address> {
        self.lock().as_ref().map(|s| s.account)
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.lock().as_ref().map(|s| s.chain_id)
    }

    pub fn signer(&self) -> Result<Signer, ClientError> {
        self.lock()
            .as_ref()
            .map(|s| s.signer.clone())
            .ok_or(ClientError::NotConnected)
    }

    pub fn is_current(&self, signer: &Signer) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|s| s.signer.session_id == signer.session_id)
    }

    /// Called by the boundary layer when the wallet reports a different account.
    /// An empty account tears the session down.
    pub fn on_external_account_change(&self, account: Option<Address>) -> Option<Session> {
        let Some(account) = account else {
            self.disconnect();
            return None;
        };
        let chain_id = {
            let state = self.lock();
            match state.as_ref() {
                Some(session) if session.account == account => return Some(session.clone()),
                Some(session) => session.chain_id,
                None => return None,
            }
        };
        let session = self.install(account, chain_id);
        self.persist(|store| store.save_account(account));
        info!(account = ?account, "wallet account changed");
        Some(session)
    }

    pub fn on_external_network_change(&self, chain_id: u64) {
        let mut state = self.lock();
        if let Some(session) = state.as_mut() {
            session.chain_id = chain_id;
            drop(state);
            self.persist(|store| store.save_network(chain_id));
            info!(chain_id, "wallet network changed");
        }
    }

    /// Reads the wallet's current chain id into the session.
    pub async fn refresh_chain_id(&self) -> Result<u64, ClientError> {
        let chain_id = self
            .wallet
            .chain_id()
            .await
            .map_err(|err| ClientError::from_wallet(err, "read network"))?;
        self.on_external_network_change(chain_id);
        Ok(chain_id)
    }

    fn install(&self, account: Address, chain_id: u64) -> Session {
        let session = Session {
            account,
            chain_id,
            signer: Signer {
                session_id: self.next_id.fetch_add(1, Ordering::Relaxed),
                account,
            },
        };
        *self.lock() = Some(session.clone());
        session
    }

    fn persist(&self, write: impl FnOnce(&SessionStore) -> color_eyre::eyre::Result<()>) {
        if let Some(store) = &self.store {
            if let Err(err) = write(store) {
                warn!(?err, "failed to persist session state");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
