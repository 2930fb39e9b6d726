//! Orchestration operations over the cluster topology.

mod lifecycle;
