//! repo-kit
//!
//! Sign in to an AT Protocol account, page through the records of a
//! collection, mark records and delete them in batches.
//!
//! State lives in a single [`store::Store`]; middleware performs the remote
//! work and reducers apply the results.

pub mod actions;
pub mod bootstrap;
pub mod commands;
pub mod deleter;
pub mod dispatcher;
pub mod domain_models;
pub mod logger;
pub mod middleware;
pub mod pager;
pub mod reducers;
pub mod selection;
pub mod state;
pub mod store;
pub mod utils;
pub mod views;
