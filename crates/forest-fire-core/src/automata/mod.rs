//! Forest-fire cellular automata.

pub mod convolution;
pub mod encoding;
pub mod forest_fire;
pub mod windy;

pub use encoding::{ConvolutionEncoding, EncodingError, Kernel};
pub use forest_fire::ForestFire;
pub use windy::WindyForestFire;
