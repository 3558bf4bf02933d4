//! Conversion of merged CLI settings into a [`GatewayConfig`].

use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};
use std::time::Duration;

use poi_gateway_upstream::{GatewayConfig, MirrorList};

use crate::{ARG_CACHE_CAPACITY, ARG_MAX_ATTEMPTS, ARG_MIRRORS, ARG_TIMEOUT_SECS, CliError};

/// Upstream options shared by `serve` and `query`, after layering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UpstreamSettings {
    pub(crate) mirrors: Option<String>,
    pub(crate) max_attempts: Option<u32>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) cache_capacity: Option<usize>,
    pub(crate) user_agent: Option<String>,
    pub(crate) coalesce: Option<bool>,
}

impl TryFrom<UpstreamSettings> for GatewayConfig {
    type Error = CliError;

    fn try_from(settings: UpstreamSettings) -> Result<Self, Self::Error> {
        let mut config = Self::default();
        if let Some(raw) = settings.mirrors {
            config = config.with_mirrors(parse_mirrors(&raw)?);
        }
        if let Some(attempts) = settings.max_attempts {
            config = config.with_max_attempts(
                NonZeroU32::new(attempts).ok_or(CliError::ZeroValue {
                    field: ARG_MAX_ATTEMPTS,
                })?,
            );
        }
        if let Some(raw_secs) = settings.timeout_secs {
            let secs = NonZeroU64::new(raw_secs).ok_or(CliError::ZeroValue {
                field: ARG_TIMEOUT_SECS,
            })?;
            config = config.with_timeout(Duration::from_secs(secs.get()));
        }
        if let Some(capacity) = settings.cache_capacity {
            config = config.with_cache_capacity(NonZeroUsize::new(capacity).ok_or(
                CliError::ZeroValue {
                    field: ARG_CACHE_CAPACITY,
                },
            )?);
        }
        if let Some(user_agent) = settings.user_agent {
            config = config.with_user_agent(user_agent);
        }
        Ok(config.with_coalescing(settings.coalesce.unwrap_or(false)))
    }
}

/// Split a comma-separated mirror list, ignoring blank entries.
pub(crate) fn parse_mirrors(raw: &str) -> Result<MirrorList, CliError> {
    MirrorList::parse(raw.split(',').filter(|entry| !entry.trim().is_empty())).map_err(
        |source| CliError::InvalidMirrors {
            field: ARG_MIRRORS,
            source,
        },
    )
}
