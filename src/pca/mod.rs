pub use self::{components::*, covariance::*, engine::*};

mod components;
mod covariance;
mod engine;
