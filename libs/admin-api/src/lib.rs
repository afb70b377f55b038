//! Admin API models shared by the dockyard daemon and its tooling

pub mod models;
