use crate::{
    deployment::NetworkDescriptor,
    error::ClientError,
    provider::WalletError,
    session::ChainSession,
};
use std::sync::Arc;
use tracing::{
    info,
    warn,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NetworkCheck {
    AlreadyActive,
    Switched,
    /// The wallet did not know the network, so it was added and switched to.
    AddedAndSwitched,
}

/// Keeps the wallet on the one network the contracts live on.
pub struct NetworkGuard {
    session: Arc<ChainSession>,
}

impl NetworkGuard {
    pub fn new(session: Arc<ChainSession>) -> Self {
        Self { session }
    }

    /// No-op when already on `required`. Otherwise one switch; on an unrecognized
    /// chain, one add followed by exactly one more switch.
    pub async fn ensure_network(
        &self,
        required: &NetworkDescriptor,
    ) -> Result<NetworkCheck, ClientError> {
        let wallet = self.session.wallet();
        let current = wallet
            .chain_id()
            .await
            .map_err(|err| ClientError::from_wallet(err, "read network"))?;
        if current == required.chain_id {
            return Ok(NetworkCheck::AlreadyActive);
        }

        let chain_id_hex = required.chain_id_hex();
        info!(from = current, to = required.chain_id, "switching wallet network");
        let check = match wallet.switch_network(&chain_id_hex).await {
            Ok(()) => NetworkCheck::Switched,
            Err(err) if err.is_unrecognized_chain() => {
                info!(chain = %required.chain_name, "wallet does not know network, adding it");
                wallet
                    .add_network(required)
                    .await
                    .map_err(|err| add_error(err, required))?;
                wallet
                    .switch_network(&chain_id_hex)
                    .await
                    .map_err(|err| switch_error(err, required, true))?;
                NetworkCheck::AddedAndSwitched
            }
            Err(err) => return Err(switch_error(err, required, false)),
        };

        if let Err(err) = self.session.refresh_chain_id().await {
            warn!(?err, "failed to re-read network after switch");
        }
        Ok(check)
    }
}

fn switch_error(err: WalletError, required: &NetworkDescriptor, after_add: bool) -> ClientError {
    match err {
        WalletError::Unavailable(reason) => ClientError::WalletUnavailable(reason),
        err @ WalletError::Rpc { .. } if err.is_user_rejection() || after_add => {
            ClientError::SwitchRejected(format!("{}: {err}", required.chain_name))
        }
        err => ClientError::ChainCallFailed(format!("switch network: {err}")),
    }
}

fn add_error(err: WalletError, required: &NetworkDescriptor) -> ClientError {
    match err {
        WalletError::Unavailable(reason) => ClientError::WalletUnavailable(reason),
        err => ClientError::AddRejected(format!("{}: {err}", required.chain_name)),
    }
}
