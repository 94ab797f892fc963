//! Matching logic, external service clients and on-disk organization

pub mod lidarr;
pub mod logging;
pub mod organizer;
pub mod quality_filter;
pub mod release_selector;
pub mod similarity;
pub mod slskd;
pub mod text_utils;
pub mod track_matcher;
pub mod traits;

pub use lidarr::LidarrClient;
pub use organizer::Organizer;
pub use quality_filter::QualityFilter;
pub use slskd::SlskdClient;
pub use traits::{CatalogService, PeerService};
