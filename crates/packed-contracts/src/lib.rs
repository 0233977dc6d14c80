//! Data contracts for the packed design studio: designs, tech packs, brand
//! assets, the in-memory session and its screens, plus the command parser
//! and event log shared by the engine and the CLI.

pub mod chat;
pub mod design;
pub mod events;
pub mod models;
pub mod session;
pub mod trends;
