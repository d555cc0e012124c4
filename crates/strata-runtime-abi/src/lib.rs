//! Strata runtime ABI crate: model-agnostic contracts shared by the generation
//! runtime and the per-architecture backends that plug into it.

pub mod backend;
pub mod model_type;
pub mod sampling;
pub mod token;
pub mod vocab;

pub use backend::*;
pub use model_type::*;
pub use sampling::*;
pub use token::*;
pub use vocab::*;
