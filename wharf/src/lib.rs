//! A content-addressed binary differencing and patching engine for directory trees.
//!
//! This crate implements the wharf wire formats and algorithms used to produce
//! and apply small, rsync-style patches between two versions of a directory
//! tree ("builds"), and to verify a build's integrity against a signature.
//!
//! - [`walk`] turns a directory on disk into a [`container::ContainerItem`]-backed listing.
//! - [`signer`] computes the block signature of a container's files.
//! - [`library`] and [`differ`] implement the rolling-hash block matcher.
//! - [`diff::DiffContext`] drives a full diff, producing a patch and a signature together.
//! - [`patch::Patch`] and [`signature::Signature`] decode those wire formats back.
//! - [`pool`] abstracts over where a diff or apply pass reads file content from.

/// Functions and structures for reading and writing wharf patches
pub mod patch;
/// Functions and structures for reading and writing wharf signatures
pub mod signature;

pub mod container;
pub mod diff;
pub mod differ;
pub mod error;
pub mod hasher;
pub mod info;
pub mod library;
pub mod manifest;
pub mod pool;
pub mod rolling;
pub mod signer;
pub mod walk;
pub mod wounds;

mod common;
mod protos;

pub use error::WharfError;
pub use patch::Patch;
pub use protos::{pwr, tlc};
pub use signature::Signature;
