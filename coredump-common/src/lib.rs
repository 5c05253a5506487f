//! This crate defines [structs for the on-disk coredump format](format/index.html).
//!
//! You probably don't want to use this crate directly, the [coredump][coredump] crate provides
//! the actual functionality of locating and walking coredumps using the structs defined here.
//!
//! [coredump]: ../coredump/index.html

pub mod format;
