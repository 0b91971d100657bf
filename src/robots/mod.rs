//! Robots.txt handling module
//!
//! Gateways serve every ArNS name from its own subdomain, so rules are
//! fetched and cached per origin.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::RobotsRules;
