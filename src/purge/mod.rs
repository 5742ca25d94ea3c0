//! Age-based purge walker: quarantine old files into per-directory
//! `.ppurge` caches, permanently remove them one age horizon later.

pub mod quarantine;
pub mod walker;
