use tracing::trace;

use crate::classify::{classify, FunctionLabel};
use crate::frame::{decode_payload, CommandFrame, FRAME_LEN, PAYLOAD_LEN, PAYLOAD_OFFSET};
use crate::{MalformedFrame, ProtocolTables, Transaction, Window};

/// [`Assembler`] configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// How many leading MOSI bytes may precede the start marker.
    pub frame_search: usize,

    /// Offset of the payload word on MISO, counted from the start of the
    /// command frame.
    pub payload_offset: usize,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            frame_search: 0,
            payload_offset: PAYLOAD_OFFSET,
        }
    }
}

/// The assembler's possible states while processing one window. The
/// default state is `AwaitingFrame`, which is returned to after `Complete`
/// or `Rejected` is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Nothing has been decoded yet.
    AwaitingFrame,

    /// A command frame was found at `offset` into the MOSI channel.
    FrameRecognized { frame: CommandFrame, offset: usize },

    /// The frame addresses an interrupt register; its payload word is
    /// expected at `payload_at` into the MISO channel.
    PayloadPending {
        transaction: Transaction,
        payload_at: usize,
    },

    /// Ready to be emitted.
    Complete(Transaction),

    /// The window does not carry a CMD53 frame.
    Rejected(MalformedFrame),
}

/// Turns chip-select windows into [`Transaction`]s. Holds no state
/// between windows.
pub struct Assembler<'t> {
    tables: &'t ProtocolTables,
    options: AssemblerOptions,
    state: State,
}

impl<'t> Assembler<'t> {
    pub fn new(tables: &'t ProtocolTables, options: AssemblerOptions) -> Self {
        Self {
            tables,
            options,
            state: State::AwaitingFrame,
        }
    }

    /// Decodes a single window. The window is rejected if it does not
    /// begin with a CMD53 frame.
    pub fn assemble(&mut self, window: &Window) -> Result<Transaction, MalformedFrame> {
        loop {
            let state = std::mem::replace(&mut self.state, State::AwaitingFrame);
            match self.step(state, window) {
                State::Complete(transaction) => return Ok(transaction),
                State::Rejected(reason) => return Err(reason),
                next => {
                    trace!(state = ?next, "assembler transition");
                    self.state = next;
                }
            }
        }
    }

    fn step(&self, state: State, window: &Window) -> State {
        match state {
            State::AwaitingFrame => self.find_frame(window),
            State::FrameRecognized { frame, offset } => {
                let transaction = self.transaction(&frame, window);
                let payload_at = offset.checked_add(self.options.payload_offset);
                match (transaction.irq_register(), payload_at) {
                    (Some(_), Some(payload_at)) => State::PayloadPending {
                        transaction,
                        payload_at,
                    },
                    (Some(_), None) => {
                        trace!(offset, "payload offset out of range");
                        State::Complete(transaction)
                    }
                    (None, _) => State::Complete(transaction),
                }
            }
            State::PayloadPending {
                mut transaction,
                payload_at,
            } => {
                let word = payload_at
                    .checked_add(PAYLOAD_LEN)
                    .and_then(|end| window.inbound.get(payload_at..end));
                let payload = match word {
                    Some([a, b, c, d]) => Some(decode_payload([a.value, b.value, c.value, d.value])),
                    _ => None,
                };

                match payload {
                    Some(value) => {
                        transaction.payload = Some(value);
                        transaction.interrupts = Some(self.tables.interrupts.decode(value));
                    }
                    None => trace!(
                        inbound = window.inbound.len(),
                        payload_at,
                        "payload not captured"
                    ),
                }

                State::Complete(transaction)
            }
            done => done,
        }
    }

    /// Looks for a frame at each permitted offset. The first match wins;
    /// if none match, the window is rejected for the reason found at
    /// offset 0.
    fn find_frame(&self, window: &Window) -> State {
        let outbound = &window.outbound;
        if outbound.len() < FRAME_LEN {
            return State::Rejected(MalformedFrame::Truncated {
                len: outbound.len(),
            });
        }

        // offsets past the last full frame cannot match
        let last = self.options.frame_search.min(outbound.len() - FRAME_LEN);

        let mut first_error = None;
        for (offset, events) in outbound.windows(FRAME_LEN).take(last + 1).enumerate() {
            let mut bytes = [0; FRAME_LEN];
            for (byte, event) in bytes.iter_mut().zip(events) {
                *byte = event.value;
            }

            match CommandFrame::parse(&bytes) {
                Ok(frame) => return State::FrameRecognized { frame, offset },
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        State::Rejected(first_error.unwrap_or(MalformedFrame::Truncated {
            len: outbound.len(),
        }))
    }

    fn transaction(&self, frame: &CommandFrame, window: &Window) -> Transaction {
        let arg = &frame.argument;

        Transaction {
            access: arg.access,
            function: arg.function,
            function_label: FunctionLabel::from_function(arg.function),
            address: arg.address,
            address_label: self.tables.addresses.lookup(arg.address),
            count: arg.count,
            block_mode: arg.block_mode,
            increment_addressing: arg.increment_addressing,
            category: classify(arg.function, arg.address),
            payload: None,
            interrupts: None,
            crc: frame.crc,
            start: window.start,
            end: window.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{AddressName, Category, IrqRegister};
    use crate::frame::AccessType;
    use crate::irq::InterruptName::*;

    const IRQ_READ: [u8; 7] = [0xFF, 0x75, 0x14, 0xC0, 0xA0, 0x04, 0x89];
    const IRQ_CLEAR: [u8; 7] = [0xFF, 0x75, 0x94, 0xC0, 0xB0, 0x04, 0xCD];

    #[rustfmt::skip]
    const IRQ_RESPONSE: [u8; 16] = [
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0x00, 0x00, 0xFF,
        // payload
        0xFE, 0x04, 0x00, 0x00,
        0xCA,
    ];

    fn assemble(outbound: &[u8], inbound: &[u8]) -> Result<Transaction, MalformedFrame> {
        Assembler::new(&ProtocolTables::MM6108, AssemblerOptions::default())
            .assemble(&Window::from_bytes(outbound, inbound))
    }

    #[test]
    fn irq_status_read() {
        let t = assemble(&IRQ_READ, &IRQ_RESPONSE).unwrap();

        assert_eq!(t.access, AccessType::Read);
        assert_eq!(t.function, 1);
        assert_eq!(t.address, 0x6050);
        assert_eq!(t.address_label, Some(AddressName::Int1Sts));
        assert_eq!(t.count, 4);
        assert_eq!(t.category, Category::RegisterControl);
        assert_eq!(t.irq_register(), Some(IrqRegister::Status));
        assert_eq!(t.crc, 0x89);
        assert_eq!(t.payload, Some(0x0000_04FE));
        assert_eq!(
            t.interrupts,
            Some(vec![
                Pager(1),
                Pager(2),
                Pager(3),
                Pager(4),
                Pager(5),
                Pager(6),
                Pager(7),
                Pager(10)
            ])
        );
    }

    #[test]
    fn irq_clear_write() {
        let t = assemble(&IRQ_CLEAR, &IRQ_RESPONSE).unwrap();

        assert_eq!(t.access, AccessType::Write);
        assert_eq!(t.irq_register(), Some(IrqRegister::Clear));
        assert_eq!(t.payload, Some(0x0000_04FE));
    }

    #[test]
    fn truncated_payload() {
        // one byte short of the payload word
        let t = assemble(&IRQ_READ, &IRQ_RESPONSE[..14]).unwrap();
        assert_eq!(t.irq_register(), Some(IrqRegister::Status));
        assert_eq!(t.payload, None);
        assert_eq!(t.interrupts, None);

        // exactly long enough
        let t = assemble(&IRQ_READ, &IRQ_RESPONSE[..15]).unwrap();
        assert_eq!(t.payload, Some(0x0000_04FE));

        let t = assemble(&IRQ_READ, &[]).unwrap();
        assert_eq!(t.payload, None);
    }

    #[test]
    fn no_payload_outside_irq_registers() {
        let t = assemble(&[0xFF, 0x75, 0x15, 0x84, 0x28, 0x04, 0x3F], &IRQ_RESPONSE).unwrap();

        assert_eq!(t.address, 0xC214);
        assert_eq!(t.address_label, Some(AddressName::DataBuf));
        assert_eq!(t.category, Category::RegisterControl);
        assert_eq!(t.payload, None);
        assert_eq!(t.interrupts, None);
    }

    #[test]
    fn rejected_windows() {
        assert_eq!(
            assemble(&IRQ_READ[..6], &IRQ_RESPONSE),
            Err(MalformedFrame::Truncated { len: 6 })
        );
        assert_eq!(
            assemble(&[], &[]),
            Err(MalformedFrame::Truncated { len: 0 })
        );
        assert_eq!(
            assemble(&[0xFE, 0x75, 0x14, 0xC0, 0xA0, 0x04, 0x89], &[]),
            Err(MalformedFrame::InvalidStartMarker(0xFE))
        );
        assert_eq!(
            assemble(&[0xFF, 0x74, 0x90, 0x80, 0x00, 0x12, 0x9D], &[]),
            Err(MalformedFrame::UnsupportedCommand(0x74))
        );
    }

    #[test]
    fn windows_are_independent() {
        let mut assembler = Assembler::new(&ProtocolTables::MM6108, AssemblerOptions::default());

        assert!(assembler.assemble(&Window::from_bytes(&[0x00; 3], &[])).is_err());
        let t = assembler
            .assemble(&Window::from_bytes(&IRQ_READ, &IRQ_RESPONSE))
            .unwrap();
        assert_eq!(t.payload, Some(0x0000_04FE));
        assert_eq!(assembler.state, State::AwaitingFrame);
    }

    #[test]
    fn frame_search() {
        let mut outbound = vec![0xFF, 0xFF];
        outbound.extend_from_slice(&IRQ_READ);
        let mut inbound = vec![0x00, 0x00];
        inbound.extend_from_slice(&IRQ_RESPONSE);

        let window = Window::from_bytes(&outbound, &inbound);

        // 0xFF is not a command token
        assert_eq!(
            Assembler::new(&ProtocolTables::MM6108, AssemblerOptions::default()).assemble(&window),
            Err(MalformedFrame::UnsupportedCommand(0xFF))
        );

        let options = AssemblerOptions {
            frame_search: 2,
            ..AssemblerOptions::default()
        };
        let t = Assembler::new(&ProtocolTables::MM6108, options)
            .assemble(&window)
            .unwrap();
        assert_eq!(t.address, 0x6050);
        // payload offset follows the frame
        assert_eq!(t.payload, Some(0x0000_04FE));
    }

    #[test]
    fn payload_offset() {
        let options = AssemblerOptions {
            payload_offset: 8,
            ..AssemblerOptions::default()
        };
        let t = Assembler::new(&ProtocolTables::MM6108, options)
            .assemble(&Window::from_bytes(&IRQ_READ, &IRQ_RESPONSE))
            .unwrap();
        assert_eq!(t.payload, Some(0xFEFF_0000));
    }

    #[test]
    fn payload_offset_out_of_range() {
        let options = AssemblerOptions {
            payload_offset: usize::MAX,
            ..AssemblerOptions::default()
        };
        let t = Assembler::new(&ProtocolTables::MM6108, options)
            .assemble(&Window::from_bytes(&IRQ_READ, &IRQ_RESPONSE))
            .unwrap();
        assert_eq!(t.irq_register(), Some(IrqRegister::Status));
        assert_eq!(t.payload, None);
        assert_eq!(t.interrupts, None);

        // frame found past offset 0
        let mut outbound = vec![0xFF];
        outbound.extend_from_slice(&IRQ_READ);
        let options = AssemblerOptions {
            frame_search: 1,
            payload_offset: usize::MAX,
        };
        let t = Assembler::new(&ProtocolTables::MM6108, options)
            .assemble(&Window::from_bytes(&outbound, &IRQ_RESPONSE))
            .unwrap();
        assert_eq!(t.address, 0x6050);
        assert_eq!(t.payload, None);
    }

    #[test]
    fn frame_search_is_bounded_by_window() {
        let options = AssemblerOptions {
            frame_search: usize::MAX,
            ..AssemblerOptions::default()
        };
        let mut assembler = Assembler::new(&ProtocolTables::MM6108, options);

        assert_eq!(
            assembler.assemble(&Window::from_bytes(&[0x00; 8], &[])),
            Err(MalformedFrame::InvalidStartMarker(0x00))
        );

        let mut outbound = vec![0xFF; 3];
        outbound.extend_from_slice(&IRQ_READ);
        let t = assembler
            .assemble(&Window::from_bytes(&outbound, &[]))
            .unwrap();
        assert_eq!(t.address, 0x6050);
    }
}
