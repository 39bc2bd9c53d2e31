mod frame_export;
mod main_loop;

pub use main_loop::start;
