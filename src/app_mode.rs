//! Run modes: a single pass or the scheduled daemon.

use std::env;

pub const RUN_MODE_ENV: &str = "SEEKARR_RUN_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Daemon,
}

impl RunMode {
    pub fn from_env() -> Option<Self> {
        env::var(RUN_MODE_ENV).ok().as_deref().and_then(Self::from_arg)
    }

    pub fn from_arg(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "once" => Some(RunMode::Once),
            "daemon" => Some(RunMode::Daemon),
            _ => None,
        }
    }

    /// CLI wins over the environment, the environment over the config file
    pub fn resolve(cli: Option<RunMode>, env: Option<RunMode>, daemon_enabled: bool) -> Self {
        cli.or(env).unwrap_or(if daemon_enabled {
            RunMode::Daemon
        } else {
            RunMode::Once
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_arg() {
        assert_eq!(RunMode::from_arg("once"), Some(RunMode::Once));
        assert_eq!(RunMode::from_arg("DAEMON"), Some(RunMode::Daemon));
        assert_eq!(RunMode::from_arg("server"), None);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            RunMode::resolve(Some(RunMode::Once), Some(RunMode::Daemon), true),
            RunMode::Once
        );
        assert_eq!(RunMode::resolve(None, Some(RunMode::Daemon), false), RunMode::Daemon);
        assert_eq!(RunMode::resolve(None, None, true), RunMode::Daemon);
        assert_eq!(RunMode::resolve(None, None, false), RunMode::Once);
    }
}
