pub mod frontend;
pub mod interaction;
pub mod viewport;
