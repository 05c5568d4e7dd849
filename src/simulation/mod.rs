pub mod config;
pub mod controller;
pub mod error;
pub mod io;
pub mod logging;
pub mod plan_modification;
pub mod policy;
pub mod population;
pub mod random;
pub mod validation;
