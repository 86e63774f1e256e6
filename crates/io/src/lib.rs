// File I/O operations

pub mod csv;
pub mod load;
pub mod table;
pub mod xlsx;

pub use load::{load_inputs, LoadedInputs};
pub use table::Table;
pub use xlsx::write_result_workbook;
