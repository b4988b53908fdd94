//! Commodore Agnus OCS — beam counter, DMA controller, copper, and blitter.
//!
//! Agnus is the master DMA controller in the Original Chip Set (OCS). It owns
//! the system bus during DMA slots, generates the beam position counters, and
//! contains the copper coprocessor and blitter sub-units.

mod agnus;
mod beam;
mod blitter;
mod copper;
mod dma_table;
mod register_pipeline;
mod scheduler;

pub use agnus::{Agnus, AgnusBlitterBus, AgnusCopperBus, SlotOwner};
pub use beam::{Beam, Region, HPOS_CNT, HPOS_MAX};
pub use blitter::{con as bltcon, AreaBlit, Blitter, BlitterAccuracy, BlitterBus, BlitterSnapshot, Channel, LineBlit};
pub use copper::{Copper, CopperBus, CopperState};
pub use dma_table::{BitplaneTables, BusOwner, DdfWindow, DmaEvent, DmaLine, EarlySlotsEnabled};
pub use register_pipeline::{RegisterPipeline, WriteSource};
pub use scheduler::{Cycle, EventEntry, EventId, Scheduler, Slot, DISPATCH_PRIORITY, NEVER, TICKS_PER_CIA_CYCLE, TICKS_PER_DMA_CYCLE};
