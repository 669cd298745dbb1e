pub mod compass;
pub mod deed;
