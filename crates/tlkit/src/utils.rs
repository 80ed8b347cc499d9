pub mod data_writer;
pub mod fs;
pub mod latin1;
pub mod mem_reader;
