//! Isolated runtime environment: path resolution and package provisioning.
//!
//! The runtime (a Python venv) must already exist; creating it is the
//! caller's job. This module only locates its interpreter and installer and
//! installs missing packages into it.

pub mod builder;

pub use builder::{Installer, Provisioner, RuntimePaths};
