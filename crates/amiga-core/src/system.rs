//! Top-level timing/DMA core (§4, §6, §7, §9).
//!
//! `System` owns the [`Scheduler`], one [`Agnus`], and both [`Cia8520`]
//! instances, and drives the fixed-priority per-DMA-cycle dispatch loop
//! (§4.1). Everything outside this core's scope — the CPU, Paula's audio/
//! disk DMA payload, Denise's pixel pipeline — is reached through the
//! caller-supplied [`ChipBus`]/[`InterruptSink`]/[`PixelSink`] traits rather
//! than owned here, grounded on `machine-amiga`'s `Amiga::tick` (it too
//! reaches out to sibling chips through plain struct fields, never through
//! a chip calling back into its own owner).

use amiga_agnus::{
    Agnus, AgnusBlitterBus, AgnusCopperBus, AreaBlit, Beam, Blitter, Cycle, EventId, LineBlit,
    Region, Scheduler, Slot, WriteSource, DISPATCH_PRIORITY, HPOS_CNT, TICKS_PER_CIA_CYCLE,
    TICKS_PER_DMA_CYCLE,
};
use amiga_cia::Cia8520;

use crate::debug::{CiaSnapshot, CopperSnapshot, DmaLineSnapshot, SchedulerSnapshot};
use crate::interrupt::{InterruptSink, IrqKind};

/// Which blitter entry point to invoke this dispatch (§4.4: area blits
/// continue via `step`, a fresh `BLTSIZE` write starts a new one in
/// whichever mode `BLTCON1.LINE` selects).
enum BlitOp {
    Step,
    StartArea(AreaBlit),
    StartLine(LineBlit),
}

/// Chip-RAM access the copper and blitter need; implemented by the host
/// over whatever backing store it uses (§1: memory itself is out of this
/// core's scope, only the access pattern is this core's concern).
pub trait ChipBus {
    fn chip_read(&mut self, addr: u32) -> u16;
    fn chip_write(&mut self, addr: u32, value: u16);
}

/// Receives bitplane DMA fetch results; implemented by an external
/// Denise-equivalent display pipeline (out of this core's scope, §1).
pub trait PixelSink {
    fn bitplane_word(&mut self, plane: u8, h: u16, value: u16);
}

/// Which CIA a register access or tick targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiaSelect {
    A,
    B,
}

/// A detected-but-non-fatal condition, surfaced to the host rather than
/// aborting the simulation (§7: "assert-only error model — anomalies are
/// collected for the host to inspect, not thrown").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    /// A blitter register write arrived while the blitter was running and
    /// was dropped (§4.4 "error conditions").
    BlitterRegisterWriteDroppedWhileRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anomaly {
    pub cycle: Cycle,
    pub kind: AnomalyKind,
}

/// Owns the scheduler and every chip this core is responsible for timing,
/// and drives them forward one DMA cycle at a time.
pub struct System {
    pub scheduler: Scheduler,
    pub agnus: Agnus,
    pub cia_a: Cia8520,
    pub cia_b: Cia8520,
    cia_a_irq_active: bool,
    cia_b_irq_active: bool,
    anomalies: Vec<Anomaly>,
    /// Clock value of the last VSYNC crossing (§6 "beam and cycle queries").
    frame_start_cycle: Cycle,
}

impl System {
    #[must_use]
    pub fn new(region: Region) -> Self {
        let mut agnus = Agnus::new(region);
        agnus.recompute_ddf_window();
        agnus.rebuild_bitplane_allocation();

        let mut scheduler = Scheduler::new();
        scheduler.schedule_rel(Slot::Sync, Cycle::from(HPOS_CNT) * TICKS_PER_DMA_CYCLE, EventId::SyncEol);
        scheduler.schedule_rel(Slot::Ciaa, TICKS_PER_CIA_CYCLE, EventId::CiaExecute);
        scheduler.schedule_rel(Slot::Ciab, TICKS_PER_CIA_CYCLE, EventId::CiaExecute);

        Self {
            scheduler,
            agnus,
            cia_a: Cia8520::new("A", amiga_cia::IrqLine::Ports),
            cia_b: Cia8520::new("B", amiga_cia::IrqLine::Exter),
            cia_a_irq_active: false,
            cia_b_irq_active: false,
            anomalies: Vec::new(),
            frame_start_cycle: 0,
        }
    }

    #[must_use]
    pub fn clock(&self) -> Cycle {
        self.scheduler.clock()
    }

    /// Clock value of the current frame's first DMA cycle (§6 "beam and
    /// cycle queries").
    #[must_use]
    pub fn start_of_current_frame(&self) -> Cycle {
        self.frame_start_cycle
    }

    /// Clock value of the first DMA cycle of the *next* frame, derived from
    /// the current frame's line count (PAL/NTSC, long/short per §6's
    /// "interlace toggling").
    #[must_use]
    pub fn start_of_next_frame(&self) -> Cycle {
        self.frame_start_cycle + self.cycles_in_current_frame()
    }

    /// Total master-clock ticks in the frame currently in progress (§6).
    #[must_use]
    pub fn cycles_in_current_frame(&self) -> Cycle {
        let lines = if self.agnus.long_frame {
            self.agnus.region.long_frame_lines()
        } else {
            self.agnus.region.short_frame_lines()
        };
        Cycle::from(lines) * Cycle::from(HPOS_CNT) * TICKS_PER_DMA_CYCLE
    }

    /// Maps a raster `Beam` position to an absolute clock value within the
    /// current frame (§6, §8 "`beam_to_cycle(cycle_to_beam(c)) == c`").
    #[must_use]
    pub fn beam_to_cycle(&self, beam: Beam) -> Cycle {
        self.frame_start_cycle + beam.to_cycle_offset()
    }

    /// Inverse of [`System::beam_to_cycle`]: maps an absolute clock value
    /// (within `[start_of_current_frame(), start_of_next_frame())`) back to
    /// its `Beam` position.
    #[must_use]
    pub fn cycle_to_beam(&self, cycle: Cycle) -> Beam {
        Beam::from_cycle_offset(cycle - self.frame_start_cycle)
    }

    /// Takes every anomaly recorded since the last call (§7).
    pub fn drain_anomalies(&mut self) -> Vec<Anomaly> {
        std::mem::take(&mut self.anomalies)
    }

    /// Stages a CPU-sourced custom-chip register write (§4.7). Blitter
    /// register writes dropped because the blitter is running are recorded
    /// as an [`Anomaly`] rather than silently lost, unlike the bare `Agnus`
    /// API this wraps.
    pub fn poke_custom(&mut self, addr: u16, value: u16) {
        if (0x040..0x080).contains(&addr) && !self.agnus.blitter.can_write_registers() {
            self.anomalies.push(Anomaly {
                cycle: self.scheduler.clock(),
                kind: AnomalyKind::BlitterRegisterWriteDroppedWhileRunning,
            });
        }
        let now = self.scheduler.clock();
        self.agnus.poke_custom(now, addr, value, WriteSource::Cpu);
    }

    /// `DMACONR`-style readback; the only custom-chip read this core
    /// services directly (everything else belongs to chips outside its
    /// scope, §1).
    #[must_use]
    pub fn peek_dmaconr(&self) -> u16 {
        self.agnus.peek_dmaconr()
    }

    pub fn write_cia(&mut self, which: CiaSelect, reg: u8, value: u8) {
        self.cia_mut(which).write(reg, value);
    }

    pub fn read_cia(&mut self, which: CiaSelect, reg: u8) -> u8 {
        self.cia_mut(which).read(reg)
    }

    fn cia_mut(&mut self, which: CiaSelect) -> &mut Cia8520 {
        match which {
            CiaSelect::A => &mut self.cia_a,
            CiaSelect::B => &mut self.cia_b,
        }
    }

    /// Advances the simulation until the scheduler clock reaches `target`,
    /// dispatching every slot due each DMA cycle in [`DISPATCH_PRIORITY`]
    /// order (§4.1).
    pub fn execute_until(
        &mut self,
        target: Cycle,
        bus: &mut impl ChipBus,
        irq: &mut impl InterruptSink,
        pixels: &mut impl PixelSink,
    ) {
        while self.scheduler.clock() < target {
            self.scheduler.advance_dma_cycle();
            self.agnus.beam.h += 1;
            self.agnus.drain_pipeline(self.scheduler.clock());

            if self.agnus.take_blit_start_pending() {
                self.start_blit(bus, irq);
            }

            for &slot in &DISPATCH_PRIORITY {
                if !self.scheduler.is_due(slot) {
                    continue;
                }
                match slot {
                    Slot::Ciaa => self.service_cia(CiaSelect::A, irq),
                    Slot::Ciab => self.service_cia(CiaSelect::B, irq),
                    Slot::Bpl => self.service_bitplane_slot(bus, pixels),
                    Slot::Das => self.service_early_slot(),
                    Slot::Cop => self.service_copper(bus),
                    Slot::Blt => self.service_blitter(bus, irq),
                    Slot::Aud(_) | Slot::Sec => self.scheduler.cancel(slot),
                    Slot::Sync => self.service_hsync(bus, irq),
                }
            }
        }
    }

    fn service_cia(&mut self, which: CiaSelect, irq: &mut impl InterruptSink) {
        let slot = match which {
            CiaSelect::A => Slot::Ciaa,
            CiaSelect::B => Slot::Ciab,
        };
        let cia = self.cia_mut(which);
        cia.tick();
        let active = cia.irq_active();
        let kind = IrqKind::from_cia_line(cia.irq_line());

        let was_active = match which {
            CiaSelect::A => &mut self.cia_a_irq_active,
            CiaSelect::B => &mut self.cia_b_irq_active,
        };
        if active && !*was_active {
            irq.raise_irq(kind);
        } else if !active && *was_active {
            irq.release_irq(kind);
        }
        *was_active = active;

        self.scheduler.schedule_inc(slot, TICKS_PER_CIA_CYCLE, EventId::CiaExecute);
    }

    fn service_bitplane_slot(&mut self, bus: &mut impl ChipBus, pixels: &mut impl PixelSink) {
        let h = self.agnus.beam.h as u16;
        if let Some(plane) = self.agnus.bitplane_slot_plane(h) {
            let idx = usize::from(plane - 1);
            let ptr = self.agnus.bpl_pt[idx];
            let word = bus.chip_read(ptr);
            pixels.bitplane_word(plane, h, word);
            self.agnus.bpl_pt[idx] = ptr.wrapping_add(2);
        }
        self.rearm_bpl_slot(h + 1);
    }

    fn service_early_slot(&mut self) {
        let h = self.agnus.beam.h as u16;
        self.rearm_early_slot(h + 1);
    }

    fn rearm_bpl_slot(&mut self, search_from: u16) {
        let h = self.agnus.beam.h as u16;
        match self.agnus.next_bpl_event_from(search_from) {
            Some(next_h) => {
                let delta = Cycle::from(next_h - h) * TICKS_PER_DMA_CYCLE;
                self.scheduler.schedule_rel(Slot::Bpl, delta, EventId::BplFetch);
            }
            None => self.scheduler.cancel(Slot::Bpl),
        }
    }

    fn rearm_early_slot(&mut self, search_from: u16) {
        let h = self.agnus.beam.h as u16;
        match self.agnus.next_early_event_from(search_from) {
            Some(next_h) => {
                let delta = Cycle::from(next_h - h) * TICKS_PER_DMA_CYCLE;
                self.scheduler.schedule_rel(Slot::Das, delta, EventId::DasRefresh);
            }
            None => self.scheduler.cancel(Slot::Das),
        }
    }

    fn service_copper(&mut self, bus: &mut impl ChipBus) {
        let cdang = self.agnus.copper.cdang;
        let mut copper = std::mem::take(&mut self.agnus.copper);
        let mut copper_bus = AgnusCopperBus {
            agnus: &mut self.agnus,
            scheduler: &mut self.scheduler,
            cdang,
            read_word: |addr: u32| bus.chip_read(addr),
        };
        copper.step(&mut copper_bus);
        self.agnus.copper = copper;
    }

    /// Restarts the copper from `COP1LC` (§4.5 VSYNC step 5). Gated by the
    /// caller on `DMAEN` + `COPEN` (§6).
    fn restart_copper(&mut self, bus: &mut impl ChipBus) {
        let cdang = self.agnus.copper.cdang;
        let mut copper = std::mem::take(&mut self.agnus.copper);
        let mut copper_bus = AgnusCopperBus {
            agnus: &mut self.agnus,
            scheduler: &mut self.scheduler,
            cdang,
            read_word: |addr: u32| bus.chip_read(addr),
        };
        copper.restart_from_vblank(&mut copper_bus);
        self.agnus.copper = copper;
    }

    fn service_blitter(&mut self, bus: &mut impl ChipBus, irq: &mut impl InterruptSink) {
        self.run_blitter(bus, irq, BlitOp::Step);
    }

    fn start_blit(&mut self, bus: &mut impl ChipBus, irq: &mut impl InterruptSink) {
        let op = if self.agnus.blit_is_line_mode() {
            BlitOp::StartLine(self.agnus.line_blit_params())
        } else {
            BlitOp::StartArea(self.agnus.area_blit_params())
        };
        self.run_blitter(bus, irq, op);
    }

    /// Swaps `Blitter` out of `Agnus` for the duration of `op` so the
    /// `BlitterBus` adapter can borrow the rest of `Agnus` at the same
    /// time without a self-referential double borrow (§9 DESIGN NOTES:
    /// "pass split borrows to handlers, never a cyclic reference").
    fn run_blitter(&mut self, bus: &mut impl ChipBus, irq: &mut impl InterruptSink, op: BlitOp) {
        let accuracy = self.agnus.blitter.accuracy;
        let mut blitter = std::mem::replace(&mut self.agnus.blitter, Blitter::new(accuracy));

        let mut on_end_blit = |agnus: &mut Agnus, scheduler: &mut Scheduler| {
            irq.raise_irq(IrqKind::Blit);
            let cdang = agnus.copper.cdang;
            let mut copper = std::mem::take(&mut agnus.copper);
            // The copper's WAIT_BLIT resume never reaches a state that
            // reads chip RAM (see DESIGN.md), so a no-op reader is safe.
            let mut copper_bus =
                AgnusCopperBus { agnus, scheduler, cdang, read_word: |_addr: u32| 0 };
            copper.notify_blitter_finished(&mut copper_bus);
            agnus.copper = copper;
        };

        let mut blitter_bus = AgnusBlitterBus {
            agnus: &mut self.agnus,
            scheduler: &mut self.scheduler,
            mem: |addr: u32, value: Option<u16>| match value {
                Some(v) => {
                    bus.chip_write(addr, v);
                    0
                }
                None => bus.chip_read(addr),
            },
            on_end_blit: &mut on_end_blit,
        };
        match op {
            BlitOp::Step => blitter.step(&mut blitter_bus),
            BlitOp::StartArea(params) => blitter.start_area(params, &mut blitter_bus),
            BlitOp::StartLine(params) => blitter.start_line(params, &mut blitter_bus),
        }

        self.agnus.blitter = blitter;
    }

    /// HSYNC/VSYNC orchestration (§4.5), grounded on `machine-amiga::tick`'s
    /// `hpos == 0` / `vpos == 0 && hpos == 0` pulse conditions: CIA-B's TOD
    /// is wired to HSYNC, CIA-A's to VSYNC, and the VSYNC crossing also
    /// raises `INT_VERTB` and restarts the copper when DMA-enabled.
    fn service_hsync(&mut self, bus: &mut impl ChipBus, irq: &mut impl InterruptSink) {
        self.agnus.beam.h = 0;
        let crosses_vsync = self.agnus.on_hsync();
        self.cia_b.tod_pulse();

        if crosses_vsync {
            self.agnus.on_vsync();
            self.cia_a.tod_pulse();
            irq.raise_irq(IrqKind::Vertb);
            if self.agnus.dma_enabled(0x0080) {
                self.restart_copper(bus);
            }
            self.frame_start_cycle = self.scheduler.clock();
        }

        self.rearm_bpl_slot(0);
        self.rearm_early_slot(0);
        self.scheduler.schedule_inc(Slot::Sync, Cycle::from(HPOS_CNT) * TICKS_PER_DMA_CYCLE, EventId::SyncEol);
    }

    #[must_use]
    pub fn scheduler_snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            clock: self.scheduler.clock(),
            beam_v: self.agnus.beam.v,
            beam_h: self.agnus.beam.h,
            next_trigger: self.scheduler.next_trigger(),
        }
    }

    #[must_use]
    pub fn dma_line_snapshot(&self) -> DmaLineSnapshot {
        let ddf = self.agnus.ddf_window();
        DmaLineSnapshot {
            ddf_start: ddf.start,
            ddf_stop: ddf.stop,
            num_bitplanes: self.agnus.num_bitplanes(),
            hires: self.agnus.hires(),
            diw_v_flop: self.agnus.diw_v_flop,
        }
    }

    #[must_use]
    pub fn copper_snapshot(&self) -> CopperSnapshot {
        CopperSnapshot {
            state: self.agnus.copper.state,
            pc: self.agnus.copper.pc,
            cop1lc: self.agnus.copper.cop1lc,
            cop2lc: self.agnus.copper.cop2lc,
        }
    }

    #[must_use]
    pub fn cia_snapshot(&self, which: CiaSelect) -> CiaSnapshot {
        let cia = match which {
            CiaSelect::A => &self.cia_a,
            CiaSelect::B => &self.cia_b,
        };
        CiaSnapshot {
            counter_a: cia.counter_a(),
            counter_b: cia.counter_b(),
            timer_a_running: cia.timer_a_running(),
            timer_b_running: cia.timer_b_running(),
            icr: cia.icr_status(),
            imr: cia.imr(),
            tod_counter: cia.tod_counter(),
            irq_active: cia.irq_active(),
        }
    }

    #[must_use]
    pub fn blitter_snapshot(&self) -> amiga_agnus::BlitterSnapshot {
        self.agnus.blitter.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::NullInterruptSink;

    struct TestMem {
        words: Vec<u16>,
    }

    impl TestMem {
        fn new() -> Self {
            Self { words: vec![0u16; 0x10000] }
        }
        fn set(&mut self, addr: u32, value: u16) {
            self.words[(addr / 2) as usize] = value;
        }
    }

    impl ChipBus for TestMem {
        fn chip_read(&mut self, addr: u32) -> u16 {
            self.words[(addr / 2) as usize]
        }
        fn chip_write(&mut self, addr: u32, value: u16) {
            self.words[(addr / 2) as usize] = value;
        }
    }

    struct NullPixelSink;
    impl PixelSink for NullPixelSink {
        fn bitplane_word(&mut self, _plane: u8, _h: u16, _value: u16) {}
    }

    #[derive(Default)]
    struct RecordingSink {
        raised: Vec<IrqKind>,
    }
    impl InterruptSink for RecordingSink {
        fn raise_irq(&mut self, kind: IrqKind) {
            self.raised.push(kind);
        }
        fn release_irq(&mut self, _kind: IrqKind) {}
    }

    #[test]
    fn dmacon_poke_is_visible_after_one_dma_cycle() {
        let mut sys = System::new(Region::Pal);
        let mut mem = TestMem::new();
        let mut irq = NullInterruptSink;
        let mut pixels = NullPixelSink;

        sys.poke_custom(0x096, 0x8220);
        sys.execute_until(3 * TICKS_PER_DMA_CYCLE, &mut mem, &mut irq, &mut pixels);

        assert_eq!(sys.agnus.dmacon & 0x07FF, 0x0220);
    }

    #[test]
    fn vsync_crossing_raises_vertb_and_pulses_both_cia_tods() {
        let mut sys = System::new(Region::Ntsc);
        let mut mem = TestMem::new();
        let mut irq = RecordingSink::default();
        let mut pixels = NullPixelSink;

        let total_lines = Cycle::from(Region::Ntsc.short_frame_lines());
        let one_frame = total_lines * Cycle::from(HPOS_CNT) * TICKS_PER_DMA_CYCLE;
        sys.execute_until(one_frame + TICKS_PER_DMA_CYCLE, &mut mem, &mut irq, &mut pixels);

        assert!(irq.raised.contains(&IrqKind::Vertb));
        assert_eq!(sys.agnus.beam.v, 1, "beam should have wrapped and started the next frame's first line");
    }

    #[test]
    fn copper_move_through_system_reaches_custom_register() {
        let mut sys = System::new(Region::Pal);
        let mut mem = TestMem::new();
        let mut irq = NullInterruptSink;
        let mut pixels = NullPixelSink;

        // A two-word copper list: MOVE COLOR00, 0x0F00; then an
        // unreachable WAIT so the copper parks instead of running off the
        // end of the zeroed memory.
        mem.set(0x1000, 0x0180); // COLOR00
        mem.set(0x1002, 0x0F00);
        mem.set(0x1004, 0xFFFF); // WAIT for a position that never occurs
        mem.set(0x1006, 0xFFFE);

        sys.agnus.copper.cop1lc = 0x1000;
        sys.agnus.poke_custom(0, 0x096, 0x8280, WriteSource::Cpu); // DMAEN + COPEN
        sys.agnus.drain_pipeline(8);
        sys.restart_copper(&mut mem);

        sys.execute_until(40 * TICKS_PER_DMA_CYCLE, &mut mem, &mut irq, &mut pixels);

        assert_eq!(sys.agnus.pipeline.is_empty(), true);
    }

    #[test]
    fn beam_to_cycle_roundtrips_within_current_frame() {
        // §8: `beam_to_cycle(cycle_to_beam(c)) == c` for every `c` in
        // `[start_of_current_frame(), start_of_next_frame())`.
        let mut sys = System::new(Region::Pal);
        let mut mem = TestMem::new();
        let mut irq = NullInterruptSink;
        let mut pixels = NullPixelSink;
        sys.execute_until(50 * TICKS_PER_DMA_CYCLE, &mut mem, &mut irq, &mut pixels);

        let start = sys.start_of_current_frame();
        let end = sys.start_of_next_frame();
        assert_eq!(end - start, sys.cycles_in_current_frame());

        for c in [start, start + TICKS_PER_DMA_CYCLE, start + 200 * TICKS_PER_DMA_CYCLE, end - TICKS_PER_DMA_CYCLE] {
            let beam = sys.cycle_to_beam(c);
            assert_eq!(sys.beam_to_cycle(beam), c);
        }
    }
}
