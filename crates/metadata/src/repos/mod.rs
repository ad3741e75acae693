//! Repository traits for metadata operations.

pub mod packages;

pub use packages::PackageRepo;
