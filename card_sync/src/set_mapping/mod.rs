//! Cross-catalog set identity resolution (offline job)

pub mod job;
pub mod names;
mod resolver;

pub use job::{
    build_mappings, fetch_catalog_a, fetch_catalog_b, read_catalog_a, read_catalog_b,
    read_overrides, write_artifact,
};
pub use resolver::{Overrides, SetResolver, MAX_DATE_DIFF_DAYS};
