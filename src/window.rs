//! Grouping of bus events into chip-select windows.

use std::time::Duration;

use tracing::{debug, trace};

/// The SPI channel a byte was transferred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Master out, slave in.
    Outbound,

    /// Master in, slave out.
    Inbound,
}

/// A single byte transferred on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteEvent {
    pub value: u8,
    pub direction: Direction,

    /// Offset from the start of the capture of the first clock edge.
    pub start: Duration,

    /// Offset from the start of the capture of the last clock edge.
    pub end: Duration,
}

/// An event as delivered by the capture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusEvent {
    /// Chip-select was asserted.
    Enable { at: Duration },

    /// A byte was transferred.
    Byte(ByteEvent),

    /// Chip-select was released.
    Disable { at: Duration },
}

/// All bytes transferred while chip-select was asserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Window {
    pub start: Duration,
    pub end: Duration,

    /// MOSI bytes in transfer order.
    pub outbound: Vec<ByteEvent>,

    /// MISO bytes in transfer order.
    pub inbound: Vec<ByteEvent>,
}

impl Window {
    /// Builds a window with zeroed timestamps from plain byte sequences.
    pub fn from_bytes(outbound: &[u8], inbound: &[u8]) -> Self {
        let events = |bytes: &[u8], direction: Direction| -> Vec<ByteEvent> {
            bytes
                .iter()
                .map(|&value| ByteEvent {
                    value,
                    direction,
                    start: Duration::default(),
                    end: Duration::default(),
                })
                .collect()
        };

        Self {
            start: Duration::default(),
            end: Duration::default(),
            outbound: events(outbound, Direction::Outbound),
            inbound: events(inbound, Direction::Inbound),
        }
    }

    /// Appends `event` to the channel it was transferred on.
    pub fn push(&mut self, event: ByteEvent) {
        match event.direction {
            Direction::Outbound => self.outbound.push(event),
            Direction::Inbound => self.inbound.push(event),
        }
    }

    pub fn outbound_bytes(&self) -> Vec<u8> {
        self.outbound.iter().map(|e| e.value).collect()
    }

    pub fn inbound_bytes(&self) -> Vec<u8> {
        self.inbound.iter().map(|e| e.value).collect()
    }
}

/// Collects [`BusEvent`]s into [`Window`]s.
#[derive(Debug, Default)]
pub struct WindowCollector {
    open: Option<Window>,
}

impl WindowCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether chip-select is currently asserted.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Feeds an event to the collector. Returns the completed window when
    /// chip-select is released.
    pub fn push(&mut self, event: BusEvent) -> Option<Window> {
        match event {
            BusEvent::Enable { at } => {
                if let Some(discarded) = self.open.take() {
                    debug!(
                        start = ?discarded.start,
                        outbound = discarded.outbound.len(),
                        "chip-select asserted twice; discarding open window"
                    );
                }
                self.open = Some(Window {
                    start: at,
                    end: at,
                    ..Window::default()
                });
                None
            }
            BusEvent::Byte(byte) => {
                match self.open.as_mut() {
                    Some(window) => window.push(byte),
                    None => trace!(value = byte.value, at = ?byte.start, "byte outside window"),
                }
                None
            }
            BusEvent::Disable { at } => match self.open.take() {
                Some(mut window) => {
                    window.end = at;
                    Some(window)
                }
                None => {
                    debug!(at = ?at, "chip-select released without being asserted");
                    None
                }
            },
        }
    }
}
