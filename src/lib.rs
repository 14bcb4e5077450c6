//! # collectgen
//!
//! Turns folders of documents into schema-validated JSON and a typed module
//! that an application imports. Declare a collection ("Post", a directory,
//! some globs, the fields every document must have) and each build produces:
//!
//! ```text
//! generated/
//! ├── collections.json     # which collections exist
//! ├── index.mjs            # export { allPosts } from './posts'
//! ├── index.d.ts           # type Post = {...}; export declare const allPosts: Post[]
//! └── posts/
//!     ├── index.mjs        # imports every artifact, exports allPosts
//!     ├── hello.json
//!     └── world.json
//! ```
//!
//! # Architecture: Staged Pipeline
//!
//! Each collection runs through the same stages, each behind a trait so it
//! can be swapped per format or mocked in tests:
//!
//! ```text
//! 1. Load       directory + globs   →  SourceFile list
//! 2. Convert    SourceFile          →  raw record (front matter + body + _meta)
//! 3. Validate   raw record          →  record matching the schema
//! 4. Write      record              →  {base_dir}/{module}/{name}.json
//! 5. Codegen    file list           →  aggregator + shared index.mjs / index.d.ts
//! ```
//!
//! Steps 2–4 run in parallel per file (rayon) and stop at the first failure.
//! Codegen runs last, so a failed build never leaves a module importing an
//! artifact that was not written.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Collection name → type, module and variable names; file identifiers and slugs |
//! | [`schema`] | Field declarations, compiled schema, `decode` with collected issues |
//! | [`typegen`] | Prints the TypeScript declaration mirroring a schema |
//! | [`config`] | `UserConfig` → `AppConfig` resolution and the `collectgen.toml` project file |
//! | [`types`] | `SourceFile`, `OutputFile`, `Record` |
//! | [`metadata`] | The reserved `_meta` provenance block |
//! | [`loader`] | Glob-driven source discovery |
//! | [`converter`] | Content converters and their registry; markdown with front matter |
//! | [`validator`] | Schema-backed record validation |
//! | [`convert`] | Per-file convert → hooks → validate → serialize |
//! | [`codegen`] | Aggregator module, conflict and identifier handling, pruning |
//! | [`registry`] | Manifest behind the shared parent module and declarations |
//! | [`writer`] | Atomic, change-aware artifact writes |
//! | [`pipeline`] | Wires the stages; project-level build, check and clean |
//! | [`error`] | The tagged `PipelineError` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Schema, Two Outputs
//!
//! The runtime validator and the TypeScript declaration are both derived from
//! the same [`schema::Schema`]. There is no hand-written `.d.ts` to drift out
//! of sync with what the validator accepts.
//!
//! ## Registry Instead of Appends
//!
//! Several collections share `index.mjs` and `index.d.ts` at the base
//! directory. Appending to them would duplicate lines on every rebuild. Each
//! collection instead upserts itself into `collections.json` and both files
//! are regenerated from it, sorted by module name. Rebuilding is idempotent
//! and the shared files do not depend on build order.
//!
//! ## Hooks Are Typed
//!
//! The pre-validation hook receives and returns a [`types::Record`]; the
//! post-conversion hook receives the validated record and returns the artifact
//! text. Both can fail with an error that is reported against the file.

pub mod codegen;
pub mod config;
pub mod convert;
pub mod converter;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod typegen;
pub mod types;
pub mod validator;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;
