//! Message-builder collaborator.
//!
//! The pipeline does not know how a record becomes a syslog payload. It
//! hands each record and the shared [`ByteArray`] to a [`MessageBuilder`]
//! and transmits whatever ends up in the buffer.

use std::{fmt::Display, io, io::Write};

use crate::byte_array::ByteArray;

/// Renders a record into the outgoing buffer.
///
/// The buffer is empty when `build` is called. A returned error fails the
/// record without touching the transport.
pub trait MessageBuilder<R>: Send + 'static {
    fn build(&self, record: &R, out: &mut ByteArray) -> io::Result<()>;
}

impl<R, F> MessageBuilder<R> for F
where
    F: Fn(&R, &mut ByteArray) -> io::Result<()> + Send + 'static,
{
    fn build(&self, record: &R, out: &mut ByteArray) -> io::Result<()> {
        self(record, out)
    }
}

/// Builder for records that are already rendered, writing their `Display`
/// output verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisplayBuilder;

impl<R: Display> MessageBuilder<R> for DisplayBuilder {
    fn build(&self, record: &R, out: &mut ByteArray) -> io::Result<()> {
        write!(out, "{record}")
    }
}
