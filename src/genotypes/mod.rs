pub use self::call_genotypes::*;

mod call_genotypes;
