//! Command frames.

use bytes::{BufMut, Bytes, BytesMut};

/// A command frame: four header bytes, an optional payload and an optional
/// expected response length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Option<Bytes>,
    le: Option<u8>,
}

impl Command {
    /// Create a command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected response length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Command class byte
    pub const fn cla(&self) -> u8 {
        self.cla
    }

    /// Instruction byte
    pub const fn ins(&self) -> u8 {
        self.ins
    }

    /// First parameter
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command payload, if any
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Expected response length, if any
    pub const fn le(&self) -> Option<u8> {
        self.le
    }

    /// Serialize into the on-wire frame
    pub fn to_bytes(&self) -> Bytes {
        let data_len = self.data.as_ref().map_or(0, |d| d.len());
        let mut buffer = BytesMut::with_capacity(4 + 1 + data_len + 1);

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only() {
        let cmd = Command::new(0xC0, 0xA4, 0x00, 0x00);
        assert_eq!(cmd.to_bytes().as_ref(), &[0xC0, 0xA4, 0x00, 0x00]);
    }

    #[test]
    fn test_data_and_le() {
        let cmd = Command::new(0xC0, 0xA4, 0x00, 0x00)
            .with_data(vec![0x3F, 0x00])
            .with_le(0x00);
        assert_eq!(
            cmd.to_bytes().as_ref(),
            &[0xC0, 0xA4, 0x00, 0x00, 0x02, 0x3F, 0x00, 0x00]
        );
    }

    #[test]
    fn test_le_only() {
        let cmd = Command::new(0xF0, 0xA8, 0x00, 0x00).with_le(0x04);
        assert_eq!(cmd.to_bytes().as_ref(), &[0xF0, 0xA8, 0x00, 0x00, 0x04]);
    }
}
