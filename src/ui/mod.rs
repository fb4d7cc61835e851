pub mod maps;
pub mod panels;
pub mod plot;
