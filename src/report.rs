pub mod drawdowns;
pub mod io;
pub mod panels;
pub mod polars_ext;
pub mod portfolio;
pub mod returns;
pub mod statistics;
