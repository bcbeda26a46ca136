pub mod normalize_and_load;

pub use normalize_and_load::*;
