pub mod color_tally;
pub mod completion;
pub mod fetcher;
pub mod input;
pub mod pixel;
pub mod pixel_grid;
pub mod sink;
