// This is free and unencumbered software released into the public domain.

//! Camera preview viewer that runs every frame through an edge detector.
//!
//! The [`shared`] module holds the whole pipeline: permission gate, camera
//! session manager, background executor, frame processing and the viewer
//! lifecycle that ties them together. [`ffi`] exposes the frame processing
//! boundary as a C ABI for host applications.

extern crate alloc;

pub mod cli;
pub mod ffi;
pub mod shared;
