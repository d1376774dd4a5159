use color_eyre::eyre::{
    Result,
    WrapErr,
    bail,
    eyre,
};
use ranger_arcade::{
    deployment::Deployment,
    executor::DEFAULT_WAIT,
    store::DEFAULT_STATE_DIR,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:8545";

const USAGE: &str = "\
Usage: ranger-arcade [OPTIONS]

Options:
  --bridge <URL>          Wallet bridge endpoint (default: http://127.0.0.1:8545)
  --keystore <NAME>       Sign with a local keystore instead of a bridge
  --keystore-dir <DIR>    Keystore directory (default: ~/.ethereum/keystore)
  --deployment <FILE>     Network and contract configuration (JSON)
  --state-dir <DIR>       Session cache and logs (default: .ranger)
  --wait-secs <SECS>      Receipt wait budget per transaction (default: 120)
  -h, --help              Print this help";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let Some(config) = parse_args(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };
    let _guard = init_tracing(&config.state_dir)?;
    client::run_app(config).await
}

/// Logs go to a daily file since the terminal belongs to the UI.
fn init_tracing(state_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(state_dir)
        .wrap_err_with(|| format!("Failed to create {}", state_dir.display()))?;
    let appender = rolling::daily(state_dir, "ranger-arcade.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("Failed to install tracing subscriber: {err}"))?;
    Ok(guard)
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<client::AppConfig>> {
    let mut bridge = None;
    let mut keystore = None;
    let mut keystore_dir = None;
    let mut deployment_path = None;
    let mut state_dir = PathBuf::from(DEFAULT_STATE_DIR);
    let mut wait = DEFAULT_WAIT;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| eyre!("{flag} expects a value\n\n{USAGE}"))
        };
        match arg.as_str() {
            "--bridge" => bridge = Some(value("--bridge")?),
            "--keystore" => keystore = Some(value("--keystore")?),
            "--keystore-dir" => keystore_dir = Some(value("--keystore-dir")?),
            "--deployment" => deployment_path = Some(PathBuf::from(value("--deployment")?)),
            "--state-dir" => state_dir = PathBuf::from(value("--state-dir")?),
            "--wait-secs" => {
                let secs: u64 = value("--wait-secs")?
                    .parse()
                    .wrap_err("--wait-secs expects a whole number of seconds")?;
                wait = Duration::from_secs(secs);
            }
            "-h" | "--help" => return Ok(None),
            other => bail!("Unknown argument {other}\n\n{USAGE}"),
        }
    }

    let wallet = match (bridge, keystore) {
        (Some(_), Some(_)) => bail!("--bridge and --keystore are mutually exclusive"),
        (_, Some(name)) => client::WalletConfig::Keystore {
            name,
            dir: keystore_dir,
        },
        (url, None) => client::WalletConfig::Bridge {
            url: url.unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string()),
        },
    };
    let deployment = match deployment_path {
        Some(path) => Deployment::load(path)?,
        None => Deployment::mintme(),
    };
    Ok(Some(client::AppConfig {
        wallet,
        deployment,
        state_dir,
        wait,
    }))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_args__defaults_to_local_bridge_on_mintme() {
        let config = parse_args(args(&[])).unwrap().unwrap();

        assert_eq!(
            config.wallet,
            client::WalletConfig::Bridge {
                url: DEFAULT_BRIDGE_URL.to_string()
            }
        );
        assert_eq!(config.deployment, Deployment::mintme());
        assert_eq!(config.wait, DEFAULT_WAIT);
    }

    #[test]
    fn parse_args__reads_keystore_and_wait() {
        let config = parse_args(args(&[
            "--keystore",
            "player",
            "--keystore-dir",
            "/tmp/keys",
            "--wait-secs",
            "30",
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(
            config.wallet,
            client::WalletConfig::Keystore {
                name: "player".to_string(),
                dir: Some("/tmp/keys".to_string()),
            }
        );
        assert_eq!(config.wait, Duration::from_secs(30));
    }

    #[test]
    fn parse_args__rejects_bridge_with_keystore() {
        let result = parse_args(args(&["--bridge", "http://x", "--keystore", "player"]));
        assert!(result.is_err());
    }

    #[test]
    fn parse_args__rejects_missing_value() {
        assert!(parse_args(args(&["--wait-secs"])).is_err());
    }

    #[test]
    fn parse_args__help_returns_none() {
        assert!(parse_args(args(&["--help"])).unwrap().is_none());
    }
}
