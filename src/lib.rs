//! Conservation — a pixel-painting engine with an exact conservation law:
//! the sum of each color channel over the whole grid never changes, no
//! matter how many brush strokes are applied. Painting a region darker in
//! one channel brightens other regions in that channel by the exact same
//! total, and vice versa.
//!
//! The engine lives in [`engine`]; everything else is shell: the desktop
//! UI ([`app`]), the pointer/viewport transform ([`camera`]), persistence
//! and export ([`io`]), the headless CLI ([`cli`]) and the session logger
//! ([`logger`]).

#![allow(dead_code)] // API surface kept for observers and future tooling

pub mod app;
pub mod camera;
pub mod cli;
pub mod engine;
pub mod io;
pub mod logger;
