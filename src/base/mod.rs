pub use self::{error::*, helpers::*, likelihoods::*, structs_and_traits::*};

mod error;
mod helpers;
mod likelihoods;
mod structs_and_traits;
