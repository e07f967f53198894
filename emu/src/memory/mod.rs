pub mod internal_memory;
pub mod io_device;

#[allow(clippy::cast_possible_truncation)]
pub mod io_registers;
