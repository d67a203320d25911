//! Pipeline stages for batch audio conversion.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and keeps network I/O confined to `submit`.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ media ──▶ submit ──▶ failure / filename
//! (path)   (filter)   (POST)     (classify / name)
//! ```
//!
//! 1. [`input`]    – turn a local path or in-memory bytes into a `Candidate`
//! 2. [`media`]    – decide whether a candidate is audio
//! 3. [`submit`]   – multipart POST to the conversion endpoint
//! 4. [`failure`]  – map status codes and messages onto `FileError`
//! 5. [`filename`] – pick the artifact name from `Content-Disposition`

pub mod failure;
pub mod filename;
pub mod input;
pub mod media;
pub mod submit;
