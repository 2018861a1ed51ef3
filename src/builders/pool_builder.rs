//! Builders to construct FTP masters from configuration.

use std::collections::HashMap;

use crate::config::{MasterConfig, PoolConfig};
use crate::core::{Connection, ConnectionFactory, FtpMaster, PoolError, Spawn};

/// Build one master from a validated pool configuration.
///
/// # Errors
///
/// [`PoolError::InvalidConfig`] when `cfg` fails validation.
pub fn build_master<C, S>(
    cfg: &PoolConfig,
    factory: impl ConnectionFactory<C>,
    spawner: S,
) -> Result<FtpMaster<C, S>, PoolError>
where
    C: Connection,
    S: Spawn,
{
    cfg.validate()
        .map_err(|e| PoolError::InvalidConfig(format!("config invalid: {e}")))?;
    tracing::debug!(
        "building pool for {}:{} with {} connections",
        cfg.access.host,
        cfg.access.port,
        cfg.max_connections
    );
    Ok(FtpMaster::from_parts(
        cfg.access.clone(),
        cfg.max_connections,
        cfg.auto_reconnect,
        cfg.error_buffer,
        Box::new(factory),
        spawner,
    ))
}

/// Build one master per configured server using the provided factory maker.
///
/// `factory_for` receives the server name and its configuration.
///
/// # Errors
///
/// [`PoolError::InvalidConfig`] when `cfg` fails validation, or whatever
/// `factory_for` returns.
pub fn build_masters<C, S, F, FF>(
    cfg: &MasterConfig,
    mut factory_for: FF,
    spawner: S,
) -> Result<HashMap<String, FtpMaster<C, S>>, PoolError>
where
    C: Connection,
    S: Spawn + Clone,
    F: ConnectionFactory<C>,
    FF: FnMut(&str, &PoolConfig) -> Result<F, PoolError>,
{
    cfg.validate()
        .map_err(|e| PoolError::InvalidConfig(format!("config invalid: {e}")))?;

    let mut masters = HashMap::with_capacity(cfg.servers.len());
    for (name, pool_cfg) in &cfg.servers {
        let factory = factory_for(name, pool_cfg)?;
        masters.insert(name.clone(), build_master(pool_cfg, factory, spawner.clone())?);
    }
    Ok(masters)
}
