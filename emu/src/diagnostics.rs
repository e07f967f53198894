//! Undefined-but-recoverable conditions raised while the core keeps running.
//!
//! Every event is logged through `tracing` at `warn` level, kept in a bounded
//! log and forwarded to an optional hook, so a debugger sitting outside the
//! core can observe them without the core ever stopping.

use std::fmt;

use crate::cpu::cpu_modes::Mode;
use crate::memory::io_device::AccessWidth;
use crate::ring_buffer::RingBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    UnmappedRead {
        address: u32,
        width: AccessWidth,
    },
    UnmappedWrite {
        address: u32,
        width: AccessWidth,
        value: u32,
    },
    /// The owning device has no handler for this width, not even bytes.
    UnsupportedWidth {
        device: &'static str,
        address: u32,
        width: AccessWidth,
    },
    DeviceOverlap {
        name: &'static str,
        start: u32,
        end: u32,
        existing: &'static str,
    },
    /// Saved status accessed from a mode without a bank, CPSR used instead.
    SavedStatusUnavailable {
        mode: Mode,
    },
    /// Saved status read after it was already consumed by a return.
    StaleSavedStatus {
        mode: Mode,
    },
    ReservedCondition {
        address: u32,
        opcode: u32,
    },
    InvalidModeWrite {
        bits: u32,
    },
    UndefinedInstruction {
        address: u32,
        opcode: u32,
    },
    Breakpoint {
        address: u32,
        opcode: u32,
    },
    CoprocessorAccess {
        address: u32,
        opcode: u32,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmappedRead { address, width } => {
                write!(f, "unmapped {width} read at 0x{address:08X}")
            }
            Self::UnmappedWrite {
                address,
                width,
                value,
            } => write!(
                f,
                "unmapped {width} write of 0x{value:08X} at 0x{address:08X}"
            ),
            Self::UnsupportedWidth {
                device,
                address,
                width,
            } => write!(f, "{device} does not accept {width} access at 0x{address:08X}"),
            Self::DeviceOverlap {
                name,
                start,
                end,
                existing,
            } => write!(
                f,
                "{name} [0x{start:08X}, 0x{end:08X}) overlaps already registered {existing}"
            ),
            Self::SavedStatusUnavailable { mode } => {
                write!(f, "no saved status in {mode} mode, using CPSR")
            }
            Self::StaleSavedStatus { mode } => {
                write!(f, "saved status of {mode} mode read after it was consumed")
            }
            Self::ReservedCondition { address, opcode } => write!(
                f,
                "reserved condition in 0x{opcode:08X} at 0x{address:08X}, skipped"
            ),
            Self::InvalidModeWrite { bits } => {
                write!(f, "rejected invalid mode bits 0b{bits:05b}")
            }
            Self::UndefinedInstruction { address, opcode } => {
                write!(f, "undefined instruction 0x{opcode:08X} at 0x{address:08X}")
            }
            Self::Breakpoint { address, opcode } => {
                write!(f, "breakpoint 0x{opcode:08X} at 0x{address:08X}")
            }
            Self::CoprocessorAccess { address, opcode } => write!(
                f,
                "coprocessor instruction 0x{opcode:08X} at 0x{address:08X}"
            ),
        }
    }
}

type DiagnosticHook = Box<dyn FnMut(&Diagnostic)>;

pub struct Diagnostics {
    log: RingBuffer<Diagnostic>,
    total: u64,
    hook: Option<DiagnosticHook>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl Diagnostics {
    pub const DEFAULT_CAPACITY: usize = 256;

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            log: RingBuffer::new(capacity),
            total: 0,
            hook: None,
        }
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");

        self.total += 1;
        if let Some(hook) = self.hook.as_mut() {
            hook(&diagnostic);
        }
        self.log.push(diagnostic);
    }

    /// Installs the callback invoked for every recorded event.
    pub fn set_hook(&mut self, hook: impl FnMut(&Diagnostic) + 'static) {
        self.hook = Some(Box::new(hook));
    }

    pub fn recent(&self) -> impl Iterator<Item = &Diagnostic> {
        self.log.iter()
    }

    pub fn drain(&mut self) -> Vec<Diagnostic> {
        self.log.drain().collect()
    }

    /// Number of events recorded since construction, including evicted ones.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }
}
