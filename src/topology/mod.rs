//! Topology model: entity handles, the collection algebra, hosts,
//! resources and the cluster arena that owns them all.

mod cluster;
mod collection;
mod host;
mod ids;
mod resource;

pub use cluster::*;
pub use collection::*;
pub use host::*;
pub use ids::*;
pub use resource::*;

#[cfg(test)]
mod cluster_test;
