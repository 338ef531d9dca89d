// src/lib.rs
//! `webview-bridge`: embeds browser-engine WebViews into a host application's
//! native event loop.
//!
//! The [`pump`] module interleaves engine work with the host's messages, the
//! [`webview`] module carries the proxy/host protocol, and [`toolkit`] puts
//! them together for either threading arrangement.

pub mod config;
pub mod geometry;
pub mod pump;
pub mod threading;
pub mod toolkit;
pub mod webview;

pub use toolkit::{EmbedderParts, Toolkit};
