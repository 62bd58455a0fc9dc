pub mod common;
pub mod components;
pub mod core;
pub mod datatypes;
pub mod parameters;
pub mod replay;
