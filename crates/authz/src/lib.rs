pub mod error;
pub mod evaluator;
pub mod permission;

pub use error::{AuthzError, Result};
pub use evaluator::{PermissionEvaluator, PermissionPolicy};
pub use permission::{catalog, PermissionSet};
