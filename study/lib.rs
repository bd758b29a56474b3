#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod config;
pub mod pipeline;

#[path = "../data/mod.rs"]
pub mod data;

#[path = "../derivation/mod.rs"]
pub mod derivation;

#[path = "../survey/mod.rs"]
pub mod survey;

#[path = "../report/mod.rs"]
pub mod report;
