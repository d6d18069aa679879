//! Site politeness: crawl-exclusion rules, request spacing, in-flight caps.

pub mod policy;
pub mod robots;

pub use policy::{PolitenessPermit, PolitenessPolicy};
pub use robots::{HttpRobotsSource, RobotsSource, RobotsTxt};
