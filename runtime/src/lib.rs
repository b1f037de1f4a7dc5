//! Docview runtime library: rendered-content extraction for iframed
//! document viewers.
//!
//! A [`renderer::Renderer`] starts browser sessions; [`session::SessionScope`]
//! owns one for the duration of a batch. [`preview`] finds viewer URLs on a
//! board page, [`extraction`] reads the text out of a rendered viewer,
//! [`pipeline`] wraps both in per-attempt deadlines and retries, and
//! [`batch`] drives whole document lists through one session.

#![allow(clippy::new_without_default)]

pub mod acquisition;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod markdown;
pub mod pipeline;
pub mod preview;
pub mod renderer;
pub mod session;
