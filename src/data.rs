pub mod domain;
pub mod table;
pub mod window;
