// # Persistence Port Implementations
//
// This module provides implementations of the PersistencePort trait for
// different durability strategies.

pub mod file;
pub mod memory;

pub use file::{FilePort, FilePortFactory};
pub use memory::{MemoryPort, MemoryPortFactory};
