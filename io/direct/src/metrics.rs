//! Fixed descriptor metrics.

use metriken::{Counter, Gauge, metric};

#[metric(
    name = "direct_files_registered",
    description = "Number of occupied fixed file slots"
)]
pub static FILES_REGISTERED: Gauge = Gauge::new();

#[metric(
    name = "direct_installs",
    description = "Fixed slots installed into the process descriptor table"
)]
pub static INSTALLS: Counter = Counter::new();

#[metric(
    name = "direct_install_errors",
    description = "Install operations rejected or failed"
)]
pub static INSTALL_ERRORS: Counter = Counter::new();

#[metric(name = "direct_retires", description = "Fixed slots retired")]
pub static RETIRES: Counter = Counter::new();

#[metric(name = "direct_reads", description = "Reads through fixed slots")]
pub static FIXED_READS: Counter = Counter::new();

#[metric(name = "direct_writes", description = "Writes through fixed slots")]
pub static FIXED_WRITES: Counter = Counter::new();

#[metric(
    name = "direct_resolve_errors",
    description = "Fixed references that did not resolve to an occupied slot"
)]
pub static RESOLVE_ERRORS: Counter = Counter::new();
