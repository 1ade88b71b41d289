pub mod consensus;
pub mod price;
pub mod report;
pub mod roster;
