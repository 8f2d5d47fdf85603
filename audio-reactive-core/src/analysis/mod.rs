pub mod bands;
pub mod fft;
pub mod onset;
pub mod spectrum;
pub mod visualizer;
