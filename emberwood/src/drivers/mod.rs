//! Hardware device drivers

pub mod serial;
