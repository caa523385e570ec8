//! Clover: a small imperative language for resource-constrained
//! microcontrollers, compiled to a compact byte-oriented bytecode.
//!
//! The crate bundles the toolchain around one shared instruction set:
//! - `compiler`: translates Clover source into an executable image
//! - `vm`: executes an image against a host-provided ROM and log sink
//! - `decompiler`: re-parses an image into readable assembly
//! - `native`: the native-function bridge and built-in core module
//!
//! The executable image starts with the `arly` magic, carries the
//! constants pool, a command table mapping names to `init`/`loop` entry
//! points, and the code area.

pub mod compiler;
pub mod decompiler;
pub mod native;
pub mod opcodes;
pub mod scanner;
pub mod vm;

pub use compiler::{compile, CompileError};
pub use decompiler::{decompile, DecompileError};
pub use native::{NativeCore, NativeModule};
pub use vm::{Host, Interpreter};
