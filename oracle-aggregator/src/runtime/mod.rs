pub mod builder;
pub mod round_driver;
