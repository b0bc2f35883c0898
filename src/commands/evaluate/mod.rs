mod driver;
mod gold;
mod run;

pub use run::run;
