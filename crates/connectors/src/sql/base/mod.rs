pub mod destination;
pub mod encoder;
pub mod source;
