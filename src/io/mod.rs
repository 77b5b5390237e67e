//! Output-side I/O plumbing.

pub mod compression;
