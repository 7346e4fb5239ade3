use std::slice::ChunksExact;

/// A block of packed logic samples. Each sample is `unitsize` bytes wide and
/// covers every channel of the device, enabled or not.
#[derive(Clone, Copy, Debug)]
pub struct Logic<'a> {
    pub unitsize: usize,
    pub data: &'a [u8],
}

impl<'a> Logic<'a> {
    pub fn new(unitsize: usize, data: &'a [u8]) -> Self {
        Self { unitsize, data }
    }

    /// Complete samples only; a trailing partial sample is not yielded.
    ///
    /// Panics if `unitsize` is zero.
    pub fn samples(&self) -> ChunksExact<'a, u8> {
        self.data.chunks_exact(self.unitsize)
    }

    pub fn num_samples(&self) -> usize {
        if self.unitsize == 0 {
            0
        } else {
            self.data.len() / self.unitsize
        }
    }
}

/// A stream event, in the order it occurred during acquisition.
#[derive(Clone, Copy, Debug)]
pub enum Packet<'a> {
    Trigger,
    Logic(Logic<'a>),
    End,
}
