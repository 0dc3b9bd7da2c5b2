pub use self::{allele_frequency_em::*, site_mask::*};

mod allele_frequency_em;
mod site_mask;
