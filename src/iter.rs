use super::{Decoder, DecoderError, DecoderErrorInt, Transaction};

use std::io::BufRead;

/// Iterator that yield [`Transaction`]s.
pub struct Transactions<'a, R>
where
    R: BufRead,
{
    decoder: &'a mut Decoder<R>,
}

impl<'a, R> Transactions<'a, R>
where
    R: BufRead,
{
    pub(super) fn new(decoder: &'a mut Decoder<R>) -> Self {
        Self { decoder }
    }
}

impl<'a, R> Iterator for Transactions<'a, R>
where
    R: BufRead,
{
    type Item = Result<Transaction, DecoderError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.decoder.next_transaction() {
            Err(DecoderErrorInt::Eof) => None,
            Err(DecoderErrorInt::Trace(e)) => Some(Err(DecoderError::Trace(e))),
            Err(DecoderErrorInt::MalformedFrame(m)) => Some(Err(DecoderError::MalformedFrame(m))),
            Ok(transaction) => Some(Ok(transaction)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    const TRACE: &str = "
        enable 0.001
        mosi 0.001 0.001 00
        disable 0.002

        enable 0.003
        mosi 0.003 0.003 FF
        mosi 0.003 0.003 75
        mosi 0.003 0.003 15
        mosi 0.003 0.003 84
        mosi 0.003 0.003 28
        mosi 0.003 0.003 04
        mosi 0.003 0.003 3F
        disable 0.004
    ";

    #[test]
    fn skips_malformed() {
        let mut decoder = Decoder::new(TRACE.as_bytes(), DecoderOptions::default());
        let mut it = decoder.transactions();

        let t = it.next().unwrap().unwrap();
        assert_eq!(t.address, 0xC214);
        assert_eq!(t.start, std::time::Duration::from_millis(3));
        assert!(it.next().is_none());
    }

    #[test]
    fn expect_malformed() {
        let mut decoder = Decoder::new(
            TRACE.as_bytes(),
            DecoderOptions {
                expect_malformed: true,
                ..DecoderOptions::default()
            },
        );
        let mut it = decoder.transactions();

        match it.next() {
            Some(Err(DecoderError::MalformedFrame(MalformedFrame::Truncated { len: 1 }))) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(it.next().unwrap().unwrap().address, 0xC214);
        assert!(it.next().is_none());
    }

    #[test]
    fn trace_errors_are_yielded() {
        let mut decoder = Decoder::new("enable\n".as_bytes(), DecoderOptions::default());
        let mut it = decoder.transactions();

        assert!(matches!(it.next(), Some(Err(DecoderError::Trace(_)))));
        assert!(it.next().is_none());
    }
}
