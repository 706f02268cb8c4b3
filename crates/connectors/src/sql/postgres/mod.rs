pub mod adapter;
pub mod encoder;
pub mod params;
pub mod utils;
