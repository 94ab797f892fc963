//! seekarr: finds wanted Lidarr albums on the Soulseek network through slskd,
//! downloads them and hands them back to Lidarr for import.

pub mod app_mode;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod services;
pub mod state;
pub mod types;
