//! Minimal CLI parsing for config path and run mode overrides.

use std::env;
use std::path::PathBuf;

use crate::app_mode::RunMode;

#[derive(Debug, Default, PartialEq)]
pub struct CliOptions {
    pub config_path: Option<PathBuf>,
    pub run_mode_override: Option<RunMode>,
    pub show_version: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--once" => options.run_mode_override = Some(RunMode::Once),
                "--daemon" => options.run_mode_override = Some(RunMode::Daemon),
                "--version" | "-V" => options.show_version = true,
                "--config" | "-c" => {
                    if let Some(value) = args.next() {
                        options.config_path = Some(PathBuf::from(value));
                    }
                }
                _ if arg.starts_with("--config=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.config_path = Some(PathBuf::from(value));
                    }
                }
                _ => {}
            }
        }
        options
    }
}
