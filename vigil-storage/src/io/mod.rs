pub mod batch_reader;
pub mod lines;

pub use batch_reader::{count_lines, read_last_lines, read_line_range, READ_WINDOW};
pub use lines::{join_rows, last_rows, row_range, split_rows};
