use chrono::Utc;
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
    path::{
        Path,
        PathBuf,
    },
};

pub const DEFAULT_STATE_DIR: &str = ".ranger";
const SESSION_FILE: &str = "session.json";

/// The last connected account and network, kept across restarts.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct CachedSession {
    #[serde(default)]
    pub account: Option<Address>,
    #[serde(default)]
    pub network: Option<u64>,
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl CachedSession {
    pub fn new(account: Address, network: u64) -> Self {
        Self {
            account: Some(account),
            network: Some(network),
            saved_at: Some(Utc::now().to_rfc3339()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Result<Self> {
        let path = ensure_store(state_dir.as_ref())?;
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<Option<CachedSession>> {
        read_record(&self.path)
    }

    pub fn save(&self, session: &CachedSession) -> Result<()> {
        write_record(&self.path, session)
    }

    pub fn save_account(&self, account: Address) -> Result<()> {
        self.update(|record| record.account = Some(account))
    }

    pub fn save_network(&self, network: u64) -> Result<()> {
        self.update(|record| record.network = Some(network))
    }

    fn update(&self, apply: impl FnOnce(&mut CachedSession)) -> Result<()> {
        let mut record = self.load()?.unwrap_or_default();
        apply(&mut record);
        record.saved_at = Some(Utc::now().to_rfc3339());
        write_record(&self.path, &record)
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).wrap_err_with(|| {
                format!("Failed to remove session file {}", self.path.display())
            })?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ensure_store(state_dir: &Path) -> Result<PathBuf> {
    if !state_dir.exists() {
        fs::create_dir_all(state_dir).wrap_err_with(|| {
            format!("Failed to create state directory {}", state_dir.display())
        })?;
    }
    Ok(state_dir.join(SESSION_FILE))
}

fn read_record(path: &Path) -> Result<Option<CachedSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path).wrap_err("Failed to read cached session")?;
    if data.is_empty() {
        return Ok(None);
    }
    let record = serde_json::from_slice::<CachedSession>(&data)
        .wrap_err("Failed to parse cached session JSON")?;
    Ok(Some(record))
}

fn write_record(path: &Path, record: &CachedSession) -> Result<()> {
    let json =
        serde_json::to_vec_pretty(record).wrap_err("Failed to serialize cached session")?;
    fs::write(path, json).wrap_err("Failed to write cached session")?;
    Ok(())
}
