//! Amiga interrupt request sources and their CPU priority levels (§6).
//!
//! `INTENA`/`INTREQ` themselves are Paula's registers (out of core scope,
//! §1); `IrqKind` only names the request bits this core's components
//! raise and release through the caller-supplied [`InterruptSink`], plus
//! the handful of bits (`Aud0..3`, `DskSyn`, `Tbe`, `Rbf`, `DskBlk`,
//! `Soft`) an external Paula/disk/serial implementation would also use so
//! one enum covers the whole interrupt map rather than a core-only subset.

/// One bit of the 14-bit `INTENA`/`INTREQ` register pair, named per the
/// standard Amiga hardware reference rather than left as a bit index (§9
/// DESIGN NOTES: "use named constants rather than opaque hex").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqKind {
    /// Serial port transmit buffer empty.
    Tbe,
    /// Disk DMA block transfer complete.
    DskBlk,
    /// Software-requested interrupt (no hardware source).
    Soft,
    /// CIA-A (keyboard, game ports, floppy status).
    Ports,
    /// Copper instruction requested an interrupt (rare; most lists don't).
    Coper,
    /// Start of vertical blanking.
    Vertb,
    /// Blitter finished (`END_BLIT`).
    Blit,
    /// Audio channel 0..3 buffer empty.
    Aud(u8),
    /// Serial port receive buffer full.
    Rbf,
    /// Disk sync word found.
    DskSyn,
    /// CIA-B (serial port handshake, parallel port).
    Exter,
}

impl IrqKind {
    /// Bit position within `INTENA`/`INTREQ` ($DFF09A/$DFF09C), matching
    /// the real hardware layout.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            IrqKind::Tbe => 0,
            IrqKind::DskBlk => 1,
            IrqKind::Soft => 2,
            IrqKind::Ports => 3,
            IrqKind::Coper => 4,
            IrqKind::Vertb => 5,
            IrqKind::Blit => 6,
            IrqKind::Aud(n) => 7 + n.min(3),
            IrqKind::Rbf => 11,
            IrqKind::DskSyn => 12,
            IrqKind::Exter => 13,
        }
    }

    /// CPU autovector level (1-6) this request bit is wired to, per the
    /// standard Amiga interrupt priority encoder.
    #[must_use]
    pub const fn cpu_level(self) -> u8 {
        match self {
            IrqKind::Tbe => 1,
            IrqKind::DskBlk | IrqKind::Soft | IrqKind::Ports => 2,
            IrqKind::Coper | IrqKind::Vertb | IrqKind::Blit => 3,
            IrqKind::Aud(_) => 4,
            IrqKind::Rbf | IrqKind::DskSyn => 5,
            IrqKind::Exter => 6,
        }
    }

    /// Which CIA's `IrqLine` this kind corresponds to, if any.
    #[must_use]
    pub const fn from_cia_line(line: amiga_cia::IrqLine) -> Self {
        match line {
            amiga_cia::IrqLine::Ports => IrqKind::Ports,
            amiga_cia::IrqLine::Exter => IrqKind::Exter,
        }
    }
}

/// Interrupt controller the core calls into (implemented by an external
/// Paula, per §6 "Interfaces the core consumes"). The core only ever
/// raises/releases `Vertb`, `Blit`, `Ports`, and `Exter` itself; the other
/// variants exist so one enum names the whole interrupt map that a real
/// host wires up around this core.
pub trait InterruptSink {
    fn raise_irq(&mut self, kind: IrqKind);
    fn release_irq(&mut self, kind: IrqKind);
}

/// A no-op sink for tests and standalone use of the scheduling core
/// without a host interrupt controller.
#[derive(Debug, Default)]
pub struct NullInterruptSink;

impl InterruptSink for NullInterruptSink {
    fn raise_irq(&mut self, _kind: IrqKind) {}
    fn release_irq(&mut self, _kind: IrqKind) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_positions_match_hardware_map() {
        assert_eq!(IrqKind::Tbe.bit(), 0);
        assert_eq!(IrqKind::Vertb.bit(), 5);
        assert_eq!(IrqKind::Blit.bit(), 6);
        assert_eq!(IrqKind::Aud(0).bit(), 7);
        assert_eq!(IrqKind::Aud(3).bit(), 10);
        assert_eq!(IrqKind::Exter.bit(), 13);
    }

    #[test]
    fn cpu_levels_group_coper_vertb_blit_together() {
        assert_eq!(IrqKind::Coper.cpu_level(), 3);
        assert_eq!(IrqKind::Vertb.cpu_level(), 3);
        assert_eq!(IrqKind::Blit.cpu_level(), 3);
    }
}
