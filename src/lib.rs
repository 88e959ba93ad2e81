//! A relocating loader for Xtensa ET_REL object files.
//!
//! The target keeps instruction and data address spaces apart while backing
//! both with the same physical memory, so a loaded function is written and
//! patched through a writable data-bus view ([`base::DataAddr`]) and
//! executed through the aliasing instruction-bus view ([`base::CodeAddr`]),
//! with a data-cache flush after every patch. Section memory, the address
//! mapping, the flush and the final jump all come from the embedding
//! through the [`host::Host`] trait; the loader contributes the ELF
//! parsing, section placement, symbol resolution and the per-format
//! Xtensa instruction patcher.
//!
//! A load scans and relocates once up front; afterwards the object's
//! entry point is picked with [`Loader::set_function`] and invoked with
//! [`Loader::run`]. Dropping the [`Loader`] releases every section buffer.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

pub mod arch;
pub mod base;
pub mod error;
pub mod header;
pub mod host;
pub mod image;
pub mod loader;
pub mod section;
pub mod symbol;

pub use base::{CodeAddr, DataAddr};
pub use error::{Error, Result};
pub use host::Host;
pub use loader::{LoadRequest, Loader};
pub use symbol::{ExportedSymbol, Resolution};

/// Load and relocate an object, then call `name` with `arg` and return its
/// result. The whole load is torn down before returning, whether the
/// function ran or the load failed.
pub fn load_and_run<H: Host>(
    request: LoadRequest<'_>,
    host: H,
    name: &str,
    arg: i32,
) -> Result<i32> {
    let mut loader = Loader::load(request, host)?;
    loader.set_function(name)?;
    Ok(loader.run(arg))
}
