//! Ties the display and input providers to one runtime session and exposes
//! them to the host engine, either as a Rust trait or as C callback tables.

#![deny(unsafe_code)]

pub mod abi;
mod context;
mod headless;

pub use abi::{CallbackTables, SubsystemErrorCode, SubsystemHandle};
pub use context::{ProviderContext, ProviderHost, XrProvider};
pub use headless::{HeadlessHost, HostEvent};
