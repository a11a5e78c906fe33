pub mod apy;
pub mod pools;
