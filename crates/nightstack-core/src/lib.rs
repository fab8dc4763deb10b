pub mod cache;
pub mod consts;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod frame;
pub mod naming;
pub mod pipeline;
pub mod stage;
