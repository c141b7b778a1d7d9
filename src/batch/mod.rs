mod controller;
mod policy;

pub use controller::{BatchController, BatchError};
pub use policy::BatchPolicy;
