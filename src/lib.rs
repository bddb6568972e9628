//! Dump validation jobs over HTTP.
//!
//! The [`client`] module uploads source and destination dumps and polls the
//! resulting run until it finishes. The job host side ([`api`], [`runs`],
//! [`worker`], [`report`]) accepts uploads, discovers the tables both sides
//! share and hands each run to an external report generator.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod discovery;
pub mod protocol;
pub mod report;
pub mod runs;
pub mod shutdown;
pub mod worker;
