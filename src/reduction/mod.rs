//! Row-partitioned parallel reductions used by every convergence test

pub use self::{chunks::*, metrics::*};

mod chunks;
mod metrics;
