//! The host-side reference layer.
//!
//! Everything here moves values across the host/VM boundary through
//! the operand stack and owns them via registry pins: [`Handle`] for a
//! single value, [`TableView`] for field access, [`ToVm`]/[`FromVm`]
//! for typed conversion, [`StackGuard`] for keeping the stack balanced
//! while doing any of it.

pub mod convert;
pub mod error;
pub mod handle;
pub mod json;
pub mod stack_guard;
pub mod table_view;

pub use convert::{FromVm, ToVm};
pub use error::TypeMismatch;
pub use handle::Handle;
pub use stack_guard::StackGuard;
pub use table_view::{Field, TableView};
