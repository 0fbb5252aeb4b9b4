pub mod assets;
pub mod event;
pub mod screen;
pub mod step;
pub mod timer;
pub mod world;
