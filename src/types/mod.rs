// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Function names, regions, image references, and resource names.

mod function_name;
mod id;
mod image_ref;
mod region;
mod resource_name;

pub use function_name::{FunctionName, FunctionNameError};
pub use id::{ImageDigest, RecordId, RegistryId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use region::{Region, RegionError};
pub use resource_name::{ResourceName, ResourceNameError};
