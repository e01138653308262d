//! Backend for a business-for-sale marketplace: listing search and detail,
//! currency display, and per-user favorites with a realtime change feed.
//!
//! [`sync::FavoritesSync`] is the client-side half of favorites: it mirrors
//! one user's saved listings and reconciles optimistic toggles against any
//! [`sync::FavoritesBackend`], including [`sync::ServiceBackend`] which runs
//! against this crate's own services.

pub mod audit;
pub mod config;
pub mod currency;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod sync;
