//! XML serialization of the package parts

pub(crate) mod parts;
pub(crate) mod sheet;
pub(crate) mod styles;
pub(crate) mod xml_writer;
