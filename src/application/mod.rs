//! Application services layer.

pub mod access;
pub mod error;
pub mod feed;
pub mod follow;
pub mod pagination;
pub mod posts;
pub mod provisioning;
pub mod repos;
pub mod uploads;
