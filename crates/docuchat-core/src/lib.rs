#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod settings;
pub mod similarity;
pub mod traits;
pub mod types;
