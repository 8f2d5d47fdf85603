pub mod auto_level;
pub mod pcm;
pub mod sample_buffer;
