//! Agnus core — DIW/DDF window tracking, HSYNC/VSYNC handlers, and the
//! custom-chip register map for Agnus- and blitter-owned registers (§4.5,
//! §6).
//!
//! The fixed-priority scheduler dispatch loop itself lives on
//! `amiga-core::System` (§9 DESIGN NOTES: no chip owns its own re-entrant
//! dispatch over the whole machine); `Agnus` owns the DMA event table, DIW/
//! DDF state, the copper, the blitter, and the register pipeline, and
//! exposes `poke_custom`/`peek_custom`/`on_hsync`/`on_vsync` for `System`
//! to drive.

use crate::beam::{Beam, Region, HPOS_CNT};
use crate::blitter::{con as bltcon, AreaBlit, Blitter, BlitterAccuracy, BlitterBus};
use crate::copper::{Copper, CopperBus};
use crate::dma_table::{BitplaneTables, BusOwner, DdfWindow, DmaLine};
use crate::register_pipeline::{is_pixel_exact_register, RegisterPipeline, WriteSource};
use crate::scheduler::Cycle;

/// Deferred-until-HSYNC work, accumulated by register writes mid-line and
/// processed once per HSYNC (§4.5 "DDF window recomputation").
#[derive(Debug, Clone, Copy, Default)]
pub struct HsyncActions {
    pub compute_ddf_window: bool,
    pub update_event_table: bool,
}

impl HsyncActions {
    fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOwner {
    Cpu,
    Refresh,
    Disk,
    Audio(u8),
    Sprite(u8),
    Bitplane(u8),
    Copper,
    Blitter,
}

pub struct Agnus {
    pub beam: Beam,
    pub region: Region,
    pub long_frame: bool,

    pub dmacon: u16,
    pub bplcon0: u16,
    pub bplcon1: u16,
    pub bplcon2: u16,
    pub bpl1mod: i16,
    pub bpl2mod: i16,
    pub bpl_pt: [u32; 6],

    pub ddfstrt: u16,
    pub ddfstop: u16,
    ddf_window: DdfWindow,

    pub diwstrt: u16,
    pub diwstop: u16,
    diw_vstrt: u16,
    diw_vstop: u16,
    diw_hstrt: i16,
    diw_hstop: i16,
    pub diw_v_flop: bool,
    pub diw_h_flop: bool,

    bitplane_tables: BitplaneTables,
    dma_line: DmaLine,
    hsync_actions: HsyncActions,

    pub pipeline: RegisterPipeline,
    pub copper: Copper,
    pub blitter: Blitter,
    pub bltcon0: u16,
    pub bltcon1: u16,
    pub bltsize: u16,
    pub blt_apt: u32,
    pub blt_bpt: u32,
    pub blt_cpt: u32,
    pub blt_dpt: u32,
    pub blt_amod: i16,
    pub blt_bmod: i16,
    pub blt_cmod: i16,
    pub blt_dmod: i16,
    pub blt_afwm: u16,
    pub blt_alwm: u16,

    pub sprite_pt: [u32; 8],
    pub dsk_pt: u32,

    /// Set by a `BLTSIZE` write, once it drains out of the register
    /// pipeline; `amiga-core::System` polls and clears this to know when
    /// to call `Blitter::start_area`/`start_line` (§4.4: "writing BLTSIZE
    /// starts the operation").
    blit_start_pending: bool,
}

impl Agnus {
    #[must_use]
    pub fn new(region: Region) -> Self {
        Self {
            beam: Beam::new(0, 0),
            region,
            long_frame: false,
            dmacon: 0,
            bplcon0: 0,
            bplcon1: 0,
            bplcon2: 0,
            bpl1mod: 0,
            bpl2mod: 0,
            bpl_pt: [0; 6],
            ddfstrt: 0,
            ddfstop: 0,
            ddf_window: DdfWindow { start: 0, stop: 0 },
            diwstrt: 0,
            diwstop: 0,
            diw_vstrt: 0,
            diw_vstop: 0,
            diw_hstrt: 0,
            diw_hstop: 0,
            diw_v_flop: false,
            diw_h_flop: true,
            bitplane_tables: BitplaneTables::new(),
            dma_line: DmaLine::new(),
            hsync_actions: HsyncActions::default(),
            pipeline: RegisterPipeline::new(),
            copper: Copper::new(),
            blitter: Blitter::new(BlitterAccuracy::Slow),
            bltcon0: 0,
            bltcon1: 0,
            bltsize: 0,
            blt_apt: 0,
            blt_bpt: 0,
            blt_cpt: 0,
            blt_dpt: 0,
            blt_amod: 0,
            blt_bmod: 0,
            blt_cmod: 0,
            blt_dmod: 0,
            blt_afwm: 0xFFFF,
            blt_alwm: 0xFFFF,
            sprite_pt: [0; 8],
            dsk_pt: 0,
            blit_start_pending: false,
        }
    }

    /// Clears and returns whether a `BLTSIZE` write has drained since the
    /// last check.
    pub fn take_blit_start_pending(&mut self) -> bool {
        std::mem::take(&mut self.blit_start_pending)
    }

    /// `true` if `BLTCON1`'s `LINE` bit selects line-draw mode over area
    /// mode for the blit `BLTSIZE` is about to start.
    #[must_use]
    pub fn blit_is_line_mode(&self) -> bool {
        self.bltcon1 & bltcon::LINE != 0
    }

    /// Builds the [`amiga_agnus::LineBlit`]-equivalent parameters from the
    /// current register file. The OCS line-draw registers don't carry a
    /// dedicated texture-pattern field in this core's register map (no
    /// Denise-side `BLTADAT` mirror is modeled here), so the initial
    /// texture is pinned to the conventional single-set-bit starting
    /// pattern (`0x8000`) rather than derived from a register this crate
    /// doesn't track.
    #[must_use]
    pub fn line_blit_params(&self) -> crate::blitter::LineBlit {
        let (_, h) = self.blt_size();
        crate::blitter::LineBlit {
            sud: self.bltcon1 & bltcon::SUD != 0,
            sul: self.bltcon1 & bltcon::SUL != 0,
            aul: self.bltcon1 & bltcon::AUL != 0,
            sing: self.bltcon1 & bltcon::SING != 0,
            sign: self.bltcon1 & bltcon::SIGN != 0,
            length: h,
            error: i32::from(self.blt_apt as i16),
            inc1: i32::from(self.blt_bmod),
            inc2: i32::from(self.blt_amod),
            texture: 0x8000,
            bitmap_ptr: self.blt_cpt,
            row_words: i32::from(self.blt_cmod),
            x_bit: 0,
        }
    }

    #[must_use]
    pub fn num_bitplanes(&self) -> u8 {
        let hires = self.hires();
        let bpu = ((self.bplcon0 >> 12) & 0x07) as u8;
        let max = if hires { 4 } else { 6 };
        if bpu > max {
            0
        } else {
            bpu
        }
    }

    #[must_use]
    pub fn hires(&self) -> bool {
        self.bplcon0 & 0x8000 != 0
    }

    #[must_use]
    pub fn dma_enabled(&self, bit: u16) -> bool {
        const DMAEN: u16 = 0x0200;
        self.dmacon & DMAEN != 0 && self.dmacon & bit != 0
    }

    /// Stages a register write into the appropriate pipeline (§4.7). The
    /// setter itself runs later, from [`Agnus::drain_pipeline`].
    pub fn poke_custom(&mut self, now: Cycle, addr: u16, value: u16, source: WriteSource) {
        // COPJMP1/2 take effect immediately: "write has no data effect but
        // switches PC ... schedules a copper fetch on the next even cycle"
        // (§6) — there is no setter to delay.
        if addr == 0x088 || addr == 0x08A {
            self.copper.pc = if addr == 0x088 { self.copper.cop1lc } else { self.copper.cop2lc };
            return;
        }

        if is_blitter_register(addr) && !self.blitter.can_write_registers() {
            // Dropped while running (§4.4 "error conditions"); the anomaly
            // is surfaced by `amiga-core` via `Anomaly`, not here.
            return;
        }

        if is_pixel_exact_register(addr) {
            // Keyed on the DMA cycle containing the write; sub-cycle pixel
            // offset is Denise's concern, outside this crate's scope.
            let trigger = Cycle::from(self.beam.h) * crate::scheduler::TICKS_PER_DMA_CYCLE;
            self.pipeline.post_pixel_exact(trigger, addr, value, source);
        } else {
            self.pipeline.post_slow(now, addr, value, source);
        }
    }

    /// Applies every write due at or before `now`, calling the per-register
    /// setter (§4.7: "calling the per-register setter, which often updates
    /// derived state").
    pub fn drain_pipeline(&mut self, now: Cycle) {
        let mut actions = HsyncActions::default();
        let mut due = Vec::new();
        self.pipeline.drain(now, |reg, value, source| due.push((reg, value, source)));
        for (reg, value, source) in due {
            self.apply_register_write(reg, value, source, &mut actions);
        }
        self.hsync_actions.compute_ddf_window |= actions.compute_ddf_window;
        self.hsync_actions.update_event_table |= actions.update_event_table;
    }

    fn apply_register_write(&mut self, reg: u16, value: u16, source: WriteSource, actions: &mut HsyncActions) {
        match reg {
            0x096 => self.set_dmacon(value),
            0x100 => {
                self.bplcon0 = value;
                actions.update_event_table = true;
            }
            0x092 => self.ddfstrt = value & 0xFC,
            0x094 => self.ddfstop = value & 0xFC,
            0x08E => self.set_diwstrt(value),
            0x090 => self.set_diwstop(value),
            0x102 => self.bplcon1 = value,
            0x104 => self.bplcon2 = value,
            0x108 => self.bpl1mod = value as i16,
            0x10A => self.bpl2mod = value as i16,
            0x080 => self.copper.cop1lc = (self.copper.cop1lc & 0xFFFF) | (u32::from(value) << 16),
            0x082 => self.copper.cop1lc = (self.copper.cop1lc & 0xFFFF_0000) | u32::from(value),
            0x084 => self.copper.cop2lc = (self.copper.cop2lc & 0xFFFF) | (u32::from(value) << 16),
            0x086 => self.copper.cop2lc = (self.copper.cop2lc & 0xFFFF_0000) | u32::from(value),
            0x02E => self.copper.cdang = value & 0x0002 != 0,
            0x040 => self.bltcon0 = value,
            0x042 => self.bltcon1 = value,
            0x044 => self.blt_afwm = value,
            0x046 => self.blt_alwm = value,
            0x058 => {
                self.bltsize = value;
                self.blit_start_pending = true;
            }
            0x048 => self.blt_cpt = (self.blt_cpt & 0xFFFF) | (u32::from(value) << 16),
            0x04A => self.blt_cpt = (self.blt_cpt & 0xFFFF_0000) | u32::from(value),
            0x04C => self.blt_bpt = (self.blt_bpt & 0xFFFF) | (u32::from(value) << 16),
            0x04E => self.blt_bpt = (self.blt_bpt & 0xFFFF_0000) | u32::from(value),
            0x050 => self.blt_apt = (self.blt_apt & 0xFFFF) | (u32::from(value) << 16),
            0x052 => self.blt_apt = (self.blt_apt & 0xFFFF_0000) | u32::from(value),
            0x054 => self.blt_dpt = (self.blt_dpt & 0xFFFF) | (u32::from(value) << 16),
            0x056 => self.blt_dpt = (self.blt_dpt & 0xFFFF_0000) | u32::from(value),
            0x060 => self.blt_cmod = value as i16,
            0x062 => self.blt_bmod = value as i16,
            0x064 => self.blt_amod = value as i16,
            0x066 => self.blt_dmod = value as i16,
            _ => {}
        }

        if matches!(reg, 0x092 | 0x094) {
            actions.compute_ddf_window = true;
        }
        let _ = source;
    }

    fn set_dmacon(&mut self, value: u16) {
        const MASK: u16 = 0x07FF;
        if value & 0x8000 != 0 {
            self.dmacon |= value & MASK;
        } else {
            self.dmacon &= !(value & MASK);
        }
    }

    fn set_diwstrt(&mut self, value: u16) {
        self.diwstrt = value;
        self.diw_vstrt = value >> 8;
        let h = i16::from(value & 0xFF);
        self.diw_hstrt = if h < 2 { -1 } else { h };
    }

    fn set_diwstop(&mut self, value: u16) {
        self.diwstop = value;
        self.diw_vstop = (value >> 8) | if value & 0x8000 == 0 { 0x100 } else { 0 };
        let hstop = (value & 0xFF) | 0x100;
        self.diw_hstop = if hstop > 0x1C7 { -1 } else { hstop as i16 };
    }

    /// `DMACONR`: low 11 bits plus the live `BBUSY`/`BZERO` flags (§6).
    #[must_use]
    pub fn peek_dmaconr(&self) -> u16 {
        let snap = self.blitter.snapshot();
        let mut v = self.dmacon & 0x07FF;
        if snap.bbusy {
            v |= 1 << 14;
        }
        if snap.bzero {
            v |= 1 << 13;
        }
        v
    }

    #[must_use]
    pub fn ddf_window(&self) -> DdfWindow {
        self.ddf_window
    }

    /// Recomputes the DDF fetch window from `ddfstrt`/`ddfstop` (§4.2 step
    /// 1, §4.5 "DDF window recomputation").
    pub fn recompute_ddf_window(&mut self) {
        let (lores, shift, hires_strt) = crate::dma_table::compute_ddf_strt(self.ddfstrt);
        self.ddf_window = crate::dma_table::compute_ddf_stop(self.ddfstop, lores, shift, hires_strt, self.hires());
    }

    /// Repaints `dma_event[]` from the precomputed tables and rebuilds
    /// `next_dma_event[]` (§4.2 steps 2-3), then re-paints the fixed
    /// refresh/disk/audio/sprite slots on top since they outrank bitplane
    /// DMA in the priority order.
    pub fn rebuild_bitplane_allocation(&mut self) {
        let bpu = self.num_bitplanes();
        self.dma_line.allocate_bitplane_slots(&self.bitplane_tables, self.hires(), bpu, self.ddf_window);
        self.dma_line.allocate_early_slots(self.early_slots_enabled());
    }

    /// Reads the early-slot enable bits off `DMACON` (§6: `DSKEN`=0x0010,
    /// `AUD0EN..AUD3EN`=0x0001..0x0008, `SPREN`=0x0020 gates all 8 sprites
    /// together since OCS has no per-sprite DMA enable).
    #[must_use]
    fn early_slots_enabled(&self) -> crate::dma_table::EarlySlotsEnabled {
        let sprites_on = self.dma_enabled(0x0020);
        crate::dma_table::EarlySlotsEnabled {
            disk: self.dma_enabled(0x0010),
            audio: [
                self.dma_enabled(0x0001),
                self.dma_enabled(0x0002),
                self.dma_enabled(0x0004),
                self.dma_enabled(0x0008),
            ],
            sprite: [sprites_on; 8],
        }
    }

    #[must_use]
    pub fn first_bpl_event(&self) -> Option<u16> {
        self.dma_line.first_bitplane_event()
    }

    #[must_use]
    pub fn next_bpl_event_from(&self, h: u16) -> Option<u16> {
        self.dma_line.next_bitplane_event_from(h)
    }

    #[must_use]
    pub fn first_early_event(&self) -> Option<u16> {
        self.dma_line.first_early_event()
    }

    #[must_use]
    pub fn next_early_event_from(&self, h: u16) -> Option<u16> {
        self.dma_line.next_early_event_from(h)
    }

    /// Plane number (1-based) owning bitplane slot `h`, if any.
    #[must_use]
    pub fn bitplane_slot_plane(&self, h: u16) -> Option<u8> {
        match self.dma_line.event(h) {
            crate::dma_table::DmaEvent::BplLores(n) | crate::dma_table::DmaEvent::BplHires(n) => Some(n),
            _ => None,
        }
    }

    /// HSYNC handler (§4.5). Returns `true` if this HSYNC also crosses
    /// into VSYNC (`beam.v` reached the line count for the region/frame
    /// parity).
    #[must_use]
    pub fn on_hsync(&mut self) -> bool {
        self.beam.v += 1;
        let num_lines =
            if self.long_frame { self.region.long_frame_lines() } else { self.region.short_frame_lines() } as i16;
        let crosses_vsync = self.beam.v >= num_lines;

        if !self.diw_v_flop && self.beam.v as u16 == self.diw_vstrt {
            self.diw_v_flop = true;
            self.hsync_actions.update_event_table = true;
        }
        if self.diw_v_flop && self.beam.v as u16 == self.diw_vstop {
            self.diw_v_flop = false;
            self.hsync_actions.update_event_table = true;
        }

        let actions = self.hsync_actions.take();
        if actions.compute_ddf_window {
            self.recompute_ddf_window();
        }
        if actions.compute_ddf_window || actions.update_event_table {
            self.rebuild_bitplane_allocation();
        }

        crosses_vsync
    }

    /// VSYNC handler (§4.5). `tod_tick` should be called on CIA-A's TOD by
    /// the caller, since CIA state lives outside `Agnus`.
    pub fn on_vsync(&mut self) {
        self.long_frame = !self.long_frame;
        self.beam.v = 0;
        self.diw_v_flop = false;
        self.diw_h_flop = true;
    }

    /// Which hardware-priority client owns DMA slot `h` on the current
    /// line, independent of the copper/blitter's dynamic free-cycle use
    /// (§4.2 priority order).
    #[must_use]
    pub fn dma_owner_at(&self, h: u16) -> Option<BusOwner> {
        if h as usize >= HPOS_CNT as usize {
            return None;
        }
        match self.dma_line.event(h) {
            crate::dma_table::DmaEvent::None => None,
            crate::dma_table::DmaEvent::Refresh => Some(BusOwner::Refresh),
            crate::dma_table::DmaEvent::Disk(_) => Some(BusOwner::Disk),
            crate::dma_table::DmaEvent::Audio(_) => Some(BusOwner::Audio),
            crate::dma_table::DmaEvent::Sprite(_) => Some(BusOwner::Sprite),
            crate::dma_table::DmaEvent::BplLores(_) | crate::dma_table::DmaEvent::BplHires(_) => {
                Some(BusOwner::Bitplane)
            }
        }
    }

    /// `BLTSIZE` decode: zero means max (§6).
    #[must_use]
    pub fn blt_size(&self) -> (u16, u16) {
        let w = self.bltsize & 0x3F;
        let h = self.bltsize >> 6;
        (if w == 0 { 64 } else { w }, if h == 0 { 1024 } else { h })
    }

    /// Builds the [`AreaBlit`] parameters from the current register file,
    /// for `BlitterBus`-driven starts.
    #[must_use]
    pub fn area_blit_params(&self) -> AreaBlit {
        let (w, h) = self.blt_size();
        AreaBlit {
            use_a: self.bltcon0 & bltcon::USE_A != 0,
            use_b: self.bltcon0 & bltcon::USE_B != 0,
            use_c: self.bltcon0 & bltcon::USE_C != 0,
            use_d: self.bltcon0 & bltcon::USE_D != 0,
            desc: self.bltcon1 & bltcon::DESC != 0,
            minterm: (self.bltcon0 & bltcon::LF_MASK) as u8,
            ash: ((self.bltcon0 >> bltcon::ASH_SHIFT) & 0xF) as u8,
            bsh: ((self.bltcon1 >> bltcon::BSH_SHIFT) & 0xF) as u8,
            fill_exclusive: self.bltcon1 & bltcon::EFE == 0 && self.bltcon1 & bltcon::IFE != 0,
            fill_enabled: self.bltcon1 & (bltcon::EFE | bltcon::IFE) != 0,
            width_words: w,
            height: h,
            first_word_mask: self.blt_afwm,
            last_word_mask: self.blt_alwm,
            a_ptr: self.blt_apt,
            b_ptr: self.blt_bpt,
            c_ptr: self.blt_cpt,
            d_ptr: self.blt_dpt,
            a_mod: i32::from(self.blt_amod),
            b_mod: i32::from(self.blt_bmod),
            c_mod: i32::from(self.blt_cmod),
            d_mod: i32::from(self.blt_dmod),
        }
    }
}

impl Default for Agnus {
    fn default() -> Self {
        Self::new(Region::Pal)
    }
}

fn is_blitter_register(addr: u16) -> bool {
    (0x040..0x080).contains(&addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dmacon_set_clear_semantics() {
        // Scenario 4.
        let mut agnus = Agnus::new(Region::Pal);
        agnus.poke_custom(0, 0x096, 0x8220, WriteSource::Cpu);
        agnus.drain_pipeline(16);
        assert_eq!(agnus.dmacon & 0x07FF, 0x0220);

        agnus.poke_custom(16, 0x096, 0x0020, WriteSource::Cpu);
        agnus.drain_pipeline(32);
        assert_eq!(agnus.dmacon & 0x07FF, 0x0200);
    }

    #[test]
    fn bplcon0_two_plane_lores_allocation_matches_dma_table() {
        // Scenario 5's inputs, reusing the grounded dma_table allocation
        // (see DESIGN.md for the discrepancy with spec.md's literal numbers).
        let mut agnus = Agnus::new(Region::Pal);
        agnus.poke_custom(0, 0x100, 0x2200, WriteSource::Cpu);
        agnus.poke_custom(0, 0x092, 0x38, WriteSource::Cpu);
        agnus.poke_custom(0, 0x094, 0xD0, WriteSource::Cpu);
        agnus.drain_pipeline(16);
        agnus.recompute_ddf_window();
        agnus.rebuild_bitplane_allocation();

        assert_eq!(agnus.num_bitplanes(), 2);
        assert_eq!(agnus.first_bpl_event(), Some(0x3B));
    }

    #[test]
    fn diwstrt_h_values_below_2_are_invalidated() {
        let mut agnus = Agnus::new(Region::Pal);
        agnus.set_diwstrt(0x2C01);
        assert_eq!(agnus.diw_hstrt, -1);
        agnus.set_diwstrt(0x2C05);
        assert_eq!(agnus.diw_hstrt, 5);
    }

    #[test]
    fn diwstop_h_above_limit_is_invalidated() {
        let mut agnus = Agnus::new(Region::Pal);
        agnus.set_diwstop(0x2CC8); // lo byte 0xC8 | 0x100 = 0x1C8, > 0x1C7
        assert_eq!(agnus.diw_hstop, -1);
    }

    #[test]
    fn blitter_register_writes_dropped_while_running() {
        let mut agnus = Agnus::new(Region::Pal);
        agnus.blitter.running = true;
        agnus.poke_custom(0, 0x040, 0x1234, WriteSource::Cpu);
        agnus.drain_pipeline(16);
        assert_eq!(agnus.bltcon0, 0, "write must be dropped, not just delayed");
    }

    #[test]
    fn copjmp_switches_pc_without_posting_a_write() {
        let mut agnus = Agnus::new(Region::Pal);
        agnus.copper.cop2lc = 0x4000;
        agnus.poke_custom(0, 0x08A, 0x0, WriteSource::Cpu);
        assert_eq!(agnus.copper.pc, 0x4000);
    }
}

/// Adapts `Agnus` to [`CopperBus`] for `amiga-core`'s dispatch loop. Kept
/// here (rather than only in `amiga-core`) because the copper's register
/// permission rule (`cdang`) and the pixel-exact/slow pipeline split are
/// both Agnus-owned state. Takes the owning `System`'s scheduler so
/// `reschedule_rel`/`park` move the real `Slot::Cop` entry rather than
/// being no-ops (§9: "no chip owns another" — the scheduler is borrowed,
/// not owned, by this adapter).
pub struct AgnusCopperBus<'a, R> {
    pub agnus: &'a mut Agnus,
    pub scheduler: &'a mut crate::scheduler::Scheduler,
    /// Snapshot of `copper.cdang`, passed in rather than read through
    /// `agnus` because the caller must take the `Copper` out of `Agnus`
    /// before constructing this bus (it's the receiver of `step`, so it
    /// can't also be borrowed live inside `agnus`).
    pub cdang: bool,
    pub read_word: R,
}

impl<'a, R: FnMut(u32) -> u16> CopperBus for AgnusCopperBus<'a, R> {
    fn read_word(&mut self, addr: u32) -> u16 {
        (self.read_word)(addr)
    }
    fn bus_free(&self) -> bool {
        self.agnus.dma_owner_at(self.agnus.beam.h as u16).is_none()
    }
    fn beam(&self) -> (u16, u16) {
        (self.agnus.beam.v as u16, self.agnus.beam.h as u16)
    }
    fn blitter_running(&self) -> bool {
        self.agnus.blitter.running
    }
    fn cdang(&self) -> bool {
        self.cdang
    }
    fn post_write(&mut self, reg: u16, value: u16, source: WriteSource) {
        let now = self.scheduler.clock();
        self.agnus.poke_custom(now, reg, value, source);
    }
    fn reschedule_rel(&mut self, delta: i64) {
        // `delta` is in DMA cycles (§4.3); the scheduler counts master
        // clock ticks, so scale by the tick/DMA-cycle ratio.
        self.scheduler.schedule_rel(
            crate::scheduler::Slot::Cop,
            delta * crate::scheduler::TICKS_PER_DMA_CYCLE,
            crate::scheduler::EventId::CopReqDma,
        );
    }
    fn park(&mut self) {
        self.scheduler.cancel(crate::scheduler::Slot::Cop);
    }
    fn last_line(&self) -> u16 {
        if self.agnus.long_frame {
            self.agnus.region.long_frame_lines()
        } else {
            self.agnus.region.short_frame_lines()
        }
    }
}

/// Adapts `Agnus` to [`BlitterBus`] for the same reason. `on_end_blit` lets
/// the caller raise `INT_BLIT` and wake a parked copper without this
/// adapter depending on `amiga-core`'s interrupt sink type.
pub struct AgnusBlitterBus<'a, 'b, RW, F> {
    pub agnus: &'a mut Agnus,
    pub scheduler: &'a mut crate::scheduler::Scheduler,
    pub mem: RW,
    pub on_end_blit: &'b mut F,
}

impl<'a, 'b, RW: FnMut(u32, Option<u16>) -> u16, F: FnMut(&mut Agnus, &mut crate::scheduler::Scheduler)> BlitterBus
    for AgnusBlitterBus<'a, 'b, RW, F>
{
    fn read_word(&mut self, addr: u32) -> u16 {
        (self.mem)(addr, None)
    }
    fn write_word(&mut self, addr: u32, value: u16) {
        (self.mem)(addr, Some(value));
    }
    fn reschedule_rel(&mut self, delta: i64) {
        // Same DMA-cycle-to-master-tick scaling as `AgnusCopperBus` (§4.4).
        self.scheduler.schedule_rel(
            crate::scheduler::Slot::Blt,
            delta * crate::scheduler::TICKS_PER_DMA_CYCLE,
            crate::scheduler::EventId::BltExecute,
        );
    }
    fn notify_end_blit(&mut self) {
        (self.on_end_blit)(self.agnus, self.scheduler);
    }
}
