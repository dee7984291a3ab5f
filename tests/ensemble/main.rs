#[path = "../common/mod.rs"]
mod common;

mod abort;
mod concurrency;
mod end_to_end;
mod failure;
mod persistence;
