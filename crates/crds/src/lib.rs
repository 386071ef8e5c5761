//! Pod IPAM CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by the pool controller and
//! the CNI plugin. The `IPPool` object is the single source of truth for which
//! addresses a pool may hand out and which consumer holds each one.

pub mod ip_pool;

pub use ip_pool::*;
