//! Architecture-specific definitions

pub mod xtensa;
