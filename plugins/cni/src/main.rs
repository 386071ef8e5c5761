//! CNI IPAM plugin
//!
//! Leases pod addresses from an `IPPool` resource: ADD allocates an address to
//! the container, DEL releases it, CHECK verifies the lease is still held.
//! The network configuration arrives on stdin, the operation and container id
//! in the `CNI_*` environment; the result or error object goes to stdout.

mod commands;
mod config;
mod error;
mod logging;
mod result;

use std::io::Read;
use std::process::ExitCode;

use tracing::{error, info, warn};

use crate::config::{CniEnv, Command, NetConf, DEFAULT_CNI_VERSION};
use crate::error::PluginError;
use crate::result::{ErrorResult, VersionResult};

fn read_stdin() -> Result<Vec<u8>, PluginError> {
    let mut bytes = Vec::new();
    std::io::stdin().read_to_end(&mut bytes)?;
    Ok(bytes)
}

async fn run(env: &CniEnv, conf: &NetConf) -> Result<Option<String>, PluginError> {
    let store = commands::open_store(&conf.ipam).await?;
    match env.command {
        Command::Add => {
            let result = commands::add(store, conf, &env.container_id).await?;
            Ok(Some(serde_json::to_string(&result)?))
        }
        Command::Del => {
            commands::del(store, &env.container_id).await?;
            Ok(None)
        }
        Command::Check => {
            let ip = commands::check(store, &env.container_id).await?;
            info!("Container {} holds {}", env.container_id, ip);
            Ok(None)
        }
        Command::Version => Ok(Some(serde_json::to_string(&VersionResult::new(&conf.cni_version))?)),
    }
}

fn fail(cni_version: &str, error: &PluginError) -> ExitCode {
    error!("{}", error);
    let body = ErrorResult {
        cni_version: cni_version.to_string(),
        code: error.code(),
        msg: error.to_string(),
    };
    match serde_json::to_string(&body) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to encode error result: {e}"),
    }
    ExitCode::FAILURE
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let env = match CniEnv::from_env() {
        Ok(env) => env,
        Err(e) => {
            logging::init(None);
            return fail(DEFAULT_CNI_VERSION, &e);
        }
    };

    // VERSION may come without a usable network config
    if env.command == Command::Version {
        let version = read_stdin()
            .ok()
            .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
            .and_then(|v| v.get("cniVersion").and_then(|s| s.as_str()).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CNI_VERSION.to_string());
        return match serde_json::to_string(&VersionResult::new(&version)) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&version, &e.into()),
        };
    }

    let conf = match read_stdin().and_then(|bytes| NetConf::parse(&bytes)) {
        Ok(conf) => conf,
        Err(e) => {
            logging::init(None);
            return fail(DEFAULT_CNI_VERSION, &e);
        }
    };

    if let Some(reason) = logging::init(conf.ipam.log_file.as_deref()) {
        warn!("{}, logging to stderr", reason);
    }
    info!(
        "{:?} for container {} (ifname {}) on pool {}",
        env.command,
        env.container_id,
        env.ifname.as_deref().unwrap_or("-"),
        conf.ipam.pool_name
    );

    match run(&env, &conf).await {
        Ok(output) => {
            if let Some(json) = output {
                println!("{json}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&conf.cni_version, &e),
    }
}
