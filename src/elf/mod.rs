//! ELF support for relocatable objects, i.e. `.o` files. Only the little-endian 64-bit
//! ARM flavor is accepted and every structure is validated before it is used.
//! Quick ELF reference: https://gist.github.com/x0nu11byt3/bcb35c3de461e5fb66173071a2379779
//!
//! ELF files start with an ELF header which includes:
//! * A magic number to identify the file as an ELF file.
//! * The architecture, e.g. AARCH64.
//! * The offset to and number of program headers (there are none in a `.o`).
//! * The offset to and number of section headers.
//!
//! Section headers identify sections. A relocatable object is nothing but sections:
//! code and data, a symbol table, string tables for section and symbol names, and
//! relocation tables listing the places the linker still has to patch.
pub mod header;
pub mod io;
pub mod kmi_file;
pub mod primitives;
pub mod relocations;
pub mod sections;
pub mod symbols;

pub use header::*;
pub use io::*;
pub use kmi_file::*;
pub use primitives::*;
pub use relocations::*;
pub use sections::*;
pub use symbols::*;
