pub mod boundary;
pub mod evaluate;
