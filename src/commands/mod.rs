pub mod create;
pub mod get;
pub mod purge_expired;
pub mod serve;
