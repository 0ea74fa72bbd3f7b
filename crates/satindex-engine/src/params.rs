//! Index configuration flags.

use clap::Parser;
use satindex_primitives::CONFIRMATION_DEPTH;
use satindex_store::IndexMode;

/// Invalid index configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Both retention-mode flags were given.
    #[error("--prune-mode and --rewrite-spent-mode are mutually exclusive")]
    ConflictingModes,
}

/// Resolved runtime configuration of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Spent-entry retention mode; fixed at index creation.
    pub mode: IndexMode,
    /// Blocks a spent entry outlives its spend before physical deletion.
    pub prune_horizon: u32,
}

/// Satoshi index params.
#[derive(Debug, Clone, Parser)]
pub struct IndexParams {
    /// Maintain the satoshi-range index.
    ///
    /// When disabled, the engine never installs pipeline callbacks and all
    /// index queries fail.
    #[clap(long)]
    pub enable_index: bool,

    /// Physically delete spent entries once they age past the prune horizon.
    ///
    /// Saves disk at the cost of the current-location query and of deep
    /// ordinal history.
    #[clap(long)]
    pub prune_mode: bool,

    /// Keep spent entries, marked spent.
    ///
    /// Required for locating the unspent output currently holding an
    /// ordinal.
    #[clap(long)]
    pub rewrite_spent_mode: bool,

    /// Number of blocks a spent entry is retained before deletion in prune
    /// mode.
    ///
    /// This is a tuning knob, not a consensus parameter; reorgs deeper than
    /// the horizon leave the index inconsistent and require a reindex.
    #[clap(long, default_value_t = CONFIRMATION_DEPTH)]
    pub prune_horizon: u32,
}

impl IndexParams {
    /// Resolves the flags into a runtime config.
    ///
    /// Returns `Ok(None)` when the index is disabled, and an error when the
    /// two retention-mode flags are combined.
    pub fn index_config(&self) -> Result<Option<IndexConfig>, ConfigError> {
        if !self.enable_index {
            return Ok(None);
        }

        let mode = match (self.prune_mode, self.rewrite_spent_mode) {
            (true, true) => return Err(ConfigError::ConflictingModes),
            (true, false) => IndexMode::Prune,
            (false, true) => IndexMode::RewriteSpent,
            (false, false) => IndexMode::Full,
        };

        Ok(Some(IndexConfig {
            mode,
            prune_horizon: self.prune_horizon,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(args: &[&str]) -> IndexParams {
        IndexParams::parse_from(std::iter::once("satindex").chain(args.iter().copied()))
    }

    #[test]
    fn test_disabled_by_default() {
        assert_eq!(params(&[]).index_config(), Ok(None));
    }

    #[test]
    fn test_default_mode_is_full() {
        let config = params(&["--enable-index"]).index_config().unwrap().unwrap();
        assert_eq!(config.mode, IndexMode::Full);
        assert_eq!(config.prune_horizon, CONFIRMATION_DEPTH);
    }

    #[test]
    fn test_mode_flags() {
        let config = params(&["--enable-index", "--prune-mode", "--prune-horizon", "10"])
            .index_config()
            .unwrap()
            .unwrap();
        assert_eq!(config.mode, IndexMode::Prune);
        assert_eq!(config.prune_horizon, 10);

        let config = params(&["--enable-index", "--rewrite-spent-mode"])
            .index_config()
            .unwrap()
            .unwrap();
        assert_eq!(config.mode, IndexMode::RewriteSpent);
    }

    #[test]
    fn test_conflicting_modes_rejected() {
        assert_eq!(
            params(&["--enable-index", "--prune-mode", "--rewrite-spent-mode"]).index_config(),
            Err(ConfigError::ConflictingModes)
        );
    }
}
