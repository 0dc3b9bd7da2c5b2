pub use self::simulate_likelihoods::*;

mod simulate_likelihoods;
