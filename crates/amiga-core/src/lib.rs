//! Top-level Amiga timing/DMA core.
//!
//! Wires together Agnus (beam, copper, blitter, DMA arbitration) and both
//! CIAs into a single fixed-priority dispatch loop driven one DMA cycle at
//! a time. Everything outside this scope — the 68000, Paula's audio/disk
//! payload DMA, Denise's pixel pipeline — is reached only through the
//! [`ChipBus`], [`InterruptSink`], and [`PixelSink`] seams `System`
//! consumes, never owned here.

mod debug;
mod interrupt;
mod system;

pub use amiga_agnus::{Agnus, Beam, Region};
pub use amiga_cia::Cia8520;

pub use debug::{
    BlitterDebugSnapshot, CiaSnapshot, CopperSnapshot, DmaLineSnapshot, SchedulerSnapshot,
};
pub use interrupt::{InterruptSink, IrqKind, NullInterruptSink};
pub use system::{Anomaly, AnomalyKind, ChipBus, CiaSelect, PixelSink, System};
