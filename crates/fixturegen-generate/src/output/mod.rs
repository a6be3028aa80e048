pub mod xml;

pub use xml::write_dataset;
