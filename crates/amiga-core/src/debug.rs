//! Read-only debug/inspection snapshots (§6: "Debug inspection returns
//! plain structs; no mutable references escape"), generalized from
//! `machine-amiga`'s `BeamDebugSnapshot`-style types to this core's scope.

use amiga_agnus::{BlitterSnapshot, Cycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub clock: Cycle,
    pub beam_v: i16,
    pub beam_h: i16,
    pub next_trigger: Cycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaLineSnapshot {
    pub ddf_start: u16,
    pub ddf_stop: u16,
    pub num_bitplanes: u8,
    pub hires: bool,
    pub diw_v_flop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopperSnapshot {
    pub state: amiga_agnus::CopperState,
    pub pc: u32,
    pub cop1lc: u32,
    pub cop2lc: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CiaSnapshot {
    pub counter_a: u16,
    pub counter_b: u16,
    pub timer_a_running: bool,
    pub timer_b_running: bool,
    pub icr: u8,
    pub imr: u8,
    pub tod_counter: u32,
    pub irq_active: bool,
}

pub use BlitterSnapshot as BlitterDebugSnapshot;
