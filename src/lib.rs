//! # paramlink
//!
//! Job parameter resolution and input/output pairing for execution
//! requests. Takes a flat, user-declared mapping of named parameters (some
//! referencing each other via `${name}` placeholders, some denoting remote
//! or local data artifacts) and produces a fully resolved, cycle-free set
//! of concrete values plus an explicit dependency graph linking declared
//! inputs to declared outputs.
//!
//! This crate executes nothing and performs no I/O: it decides *what* must
//! be transferred and *which* values an execution sees, not how.
//!
//! ## Modules
//!
//! - `name` - case-/separator-insensitive parameter name normalization
//! - `reference` - `${name}` placeholder extraction and substitution
//! - `resolver` - collision/self-reference/cycle detection and
//!   dependency-order substitution
//! - `remote` - opaque remote artifact identifiers
//! - `resolvable` - artifact value classification (downloadable/uploadable)
//! - `job_param` - resolved parameter model
//! - `pairing` - input/output cross products, set-pair merging, overrides
//! - `params` - the [`ExecutionParams`] facade tying it all together

pub mod error;
pub mod job_param;
pub mod name;
pub mod pairing;
pub mod params;
pub mod reference;
pub mod remote;
pub mod resolvable;
pub mod resolver;

pub use error::{Error, Result};
pub use job_param::{DownloadableJobParam, JobParam, ResolvedJobParam, UploadableJobParam};
pub use pairing::{
    JobParamPair, JobParamSetPair, Pair, ParamPair, ParamSetPair, ResolvedParamSetPair, SetPair,
};
pub use params::{ExecutionParams, ExecutionParamsDecl, PairOverride};
pub use reference::ReferenceToken;
pub use remote::RemoteUri;
pub use resolvable::{Downloadable, Uploadable};
