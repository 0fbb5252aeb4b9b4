pub mod bounce;
pub mod decay;
pub mod floaters;
pub mod grid;
pub mod mash;
pub mod palette;
pub mod simon;
