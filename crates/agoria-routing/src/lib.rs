pub mod qvalue;
pub mod router;

pub use qvalue::{QValue, ScoreWeights, DEFAULT_ALPHA};
pub use router::{QRouter, RouterConfig, DEFAULT_EPSILON};
