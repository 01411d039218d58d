//! Facciata pubblica del controller DMA (implementazione in `dma_impl`)

pub use crate::dma_impl::*;
