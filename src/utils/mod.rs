mod format;

pub use format::render_rows;
