//! Receive webhooks and pull local git repositories, but only on the expected branch.
//!
//! ## How it works
//!
//! `pullhook` serves a minimal HTTP endpoint. A POST to `/pull` with the shared
//! **token** and the **slug** of a configured repository checks that the working copy
//! is on the configured branch and runs `git pull origin <branch>` in it.
//!
//! ```ignore
//! +---------+       +----------+       +--------+       +------+
//! | request | ----> | registry | ----> | verify | ----> | pull |
//! +---------+       +----------+       +--------+       +------+
//! ```
//!
//! A pull never runs on a working copy which is on a different branch, and two pulls
//! of the same repository never run at the same time.

/// The configuration file, loaded once on startup.
pub mod config;
/// The repositories that can be pulled, keyed by their slug.
pub mod registry;
/// The HTTP server and the request handling.
pub mod server;
/// Verifying the branch and pulling the repositories.
pub mod sync;

/// The main program loop, that serves requests until it is stopped.
pub mod start;
