//! Structured logging bootstrap, grounded on
//! `huginn-proxy-lib/src/telemetry/tracing.rs`. The core itself never calls
//! `tracing_subscriber::fmt().init()` (library crates shouldn't install a
//! global subscriber); only the `bgpsecd` binary calls [`init_tracing`].

mod tracing_init;

pub use tracing_init::init_tracing;
