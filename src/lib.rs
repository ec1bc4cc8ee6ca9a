//! Typed environment variable lookup and casting.
//!
//! `envcast` reads process environment variables and converts their raw
//! string values into typed [`Value`]s: scalars, comma-separated lists
//! and sets, `key=value` dicts, JSON documents, and URLs. Casting rules
//! can be given at the call site, declared once in a [`Schema`], or both,
//! with the call site winning. A value of the form `{{OTHER}}` proxies the
//! lookup to another variable, and [`EnvFileLoader`] merges `NAME=value`
//! lines from a definitions file into the process environment without
//! clobbering what is already set.
//!
//! # Usage
//!
//! ```no_run
//! # fn main() -> Result<(), envcast::EnvError> {
//! use envcast::{Cast, Env, Schema, VarSpec};
//!
//! let env = Env::with_schema(
//!     Schema::new()
//!         .declare("MAIL_ENABLED", Cast::Bool)
//!         .declare("SMTP_LOGIN", VarSpec::from(Cast::Str).with_default("postmaster")),
//! );
//!
//! if env.bool("MAIL_ENABLED")? {
//!     let login = env.string("SMTP_LOGIN")?;
//!     println!("mail enabled for {login}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! The process environment is global mutable state, and `std::env::set_var`
//! is unsound under concurrent access. Resolution only reads the
//! environment, but [`EnvFileLoader::load`] writes to it: callers must not
//! mutate the environment (through this crate or otherwise) while other
//! threads resolve or read variables. Tests can lean on
//! [`testing::EnvGuard`], which serializes mutation behind a process-wide
//! lock and rolls it back.

// Deny instead of forbid so the definitions-file loader and the test
// helpers can opt back in for env::set_var/remove_var (unsafe in Rust
// 2024).
#![deny(unsafe_code)]

pub mod cast;
pub mod env;
pub mod envfile;
pub mod error;
pub mod schema;
pub mod testing;
pub mod value;

pub use cast::{Cast, CustomCast, TRUTHY_STRINGS};
pub use env::Env;
pub use envfile::{EnvFileLoader, LoadReport, read_envfile};
pub use error::EnvError;
pub use schema::{Postprocessor, Preprocessor, Schema, VarSpec};
pub use value::Value;
