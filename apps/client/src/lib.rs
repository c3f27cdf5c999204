//! Client core for the résumé-driven outreach service: REST access with token
//! refresh, the session store, route guarding, résumé upload with parse
//! polling, the email generation wizard and the paced send queue.

pub mod api_client;
pub mod config;
pub mod errors;
pub mod guard;
pub mod models;
pub mod outbox;
pub mod services;
pub mod session;
pub mod storage;
pub mod upload;
pub mod wizard;

#[cfg(test)]
mod testing;
