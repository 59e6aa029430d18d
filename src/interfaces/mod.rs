//! Outer surfaces: file formats and the operation facade used by front ends.

pub mod backoffice;
pub mod csv;
