#![allow(clippy::cast_precision_loss)]

#[path = "../common/mod.rs"]
mod common;

mod grid;
mod latin_hypercube;
mod random;
