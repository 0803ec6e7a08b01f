//! Pipeline stages for HTML-to-PDF conversion.
//!
//! Each submodule owns one boundary of the worker. The stores and the engine
//! sit behind traits so the batch processor can be driven by in-memory
//! implementations in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ storage ──▶ render ──▶ storage ──▶ storage ──▶ queue
//! (SQS)     (fetch)    (Chromium)  (store)     (sign)     (delete)
//! ```
//!
//! 1. [`input`]   — decode and validate the trigger record
//! 2. [`storage`] — read `in/{content}.html`, write `out/{id}.pdf`, presign it
//! 3. [`render`]  — print the HTML with a private headless Chromium
//! 4. [`queue`]   — acknowledge the message once everything else succeeded

pub mod input;
pub mod queue;
pub mod render;
pub mod storage;
