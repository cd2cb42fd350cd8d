pub mod logging;
pub mod room;
pub mod segment;
pub mod settings;
