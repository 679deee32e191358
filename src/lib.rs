//! kindling: bootstrap a local Kubernetes platform from one command.
//!
//! Cluster, optional TLS, image registry, workload build and deploy, then a
//! readiness check. Every external process launch goes through a validated
//! [`transport::Executor`]; the steps themselves only see the
//! [`core::deps::SetupDeps`] trait, so the whole pipeline runs against
//! recording fakes in tests.

pub mod cli;
pub mod core;
pub mod platform;
pub mod transport;
