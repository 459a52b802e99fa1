//! # Upload Imaging
//!
//! Normalizes uploaded image assets for a media library: every image is
//! converted to one canonical encoding, given a set of responsive breakpoint
//! variants, and its stored record is rewritten so that name, extension, MIME
//! type, URL and hash all agree.
//!
//! # Architecture: One Pipeline per Asset
//!
//! ```text
//! upload ──► policy ──► identify ──► transcode ──► responsive ──► reconcile
//!            (skip?)    (decode)     (main file)   (breakpoints)  (one write)
//! ```
//!
//! The host calls [`pipeline::UploadPipeline::process_upload`] directly with a
//! freshly stored asset and gets the updated record back, or a
//! [`pipeline::PipelineError`] naming the failing stage. There is no global
//! configuration: an [`config::UploadConfig`] is handed to the pipeline when
//! it is built.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`policy`] | Per-format exceptions → what to skip for one asset |
//! | [`imaging`] | Pure-Rust decode, resize and encode; breakpoint planning |
//! | [`reconcile`] | Computes the renamed record and persists it in one update |
//! | [`pipeline`] | The per-asset state machine, batch processing, API folder relocation |
//! | [`storage`] | Public URL ⇄ filesystem mapping, upload storage under unique content-derived names |
//! | [`store`] | `AssetStore` trait and the JSON-file implementation |
//! | [`config`] | `upload.toml` loading, merging and validation |
//! | [`types`] | Asset, variant and folder records |
//! | [`naming`] | Suffix substitution and content-addressed names |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Closed Set of Encodings
//!
//! Output encodings are an enum ([`imaging::ImageEncoding`]) and encoder
//! settings a matching enum ([`imaging::EncodeSettings`]), resolved once from
//! config. Adding a format means adding a variant, and the compiler points at
//! every match that needs a new arm.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and encoding use the `image` crate with pure-Rust codecs only, so
//! the binary has no system library dependencies. The crate has no lossy
//! WebP encoder; WebP output is always lossless.
//!
//! ## Single Write per Asset
//!
//! Imaging steps only produce files and in-memory results. The reconciler is
//! the one place that writes the record, and it writes it once. A crash
//! between writing files and writing the record can leave orphaned files, but
//! never a record whose URL disagrees with its MIME type.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod policy;
pub mod reconcile;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
