//! Convoy: corridor matching of travelers to shared-ride offers, plus live
//! driver position broadcast and route/ETA recomputation for rides in progress.

pub mod api;
pub mod config;
pub mod corridor;
pub mod error;
pub mod geometry;
pub mod hub;
pub mod lifecycle;
pub mod models;
pub mod offers;
pub mod route;
pub mod service;
