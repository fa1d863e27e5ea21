//! Integration test crate for MusicVerse Studio.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on the studio crates to verify they work together.

#[cfg(test)]
mod audio;

#[cfg(test)]
mod mixer;
