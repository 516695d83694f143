pub mod dma;
pub mod host;
pub mod posn;
