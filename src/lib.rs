#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod browser_controller;
pub mod extractor;
pub mod harvester;
pub mod identifier;
pub mod navigation;
pub mod page;
pub mod pager;
pub mod profile;
pub mod retrieval;
pub mod runner;
pub mod storage;
pub mod types;
pub mod utils;

#[cfg(test)]
mod fixtures;
