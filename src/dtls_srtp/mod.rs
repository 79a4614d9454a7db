pub mod keying_error;
pub mod keying_material;

pub use keying_error::KeyingError;
pub use keying_material::{DtlsRole, KeyingMaterial};
