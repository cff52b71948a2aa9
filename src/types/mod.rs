mod models;
mod trn;

pub use models::*;
pub use trn::{Trn, TrnKind};
