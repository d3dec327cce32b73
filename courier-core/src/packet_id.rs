use std::sync::atomic::{AtomicU16, Ordering};

/// Packet identifier counter of one connection.
///
/// Starts at 1 and skips 0 when it wraps.
#[derive(Debug)]
pub struct PacketIdAllocator {
    next: AtomicU16,
}

impl PacketIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU16::new(1),
        }
    }

    pub fn allocate(&self) -> u16 {
        loop {
            let packet_id = self.next.fetch_add(1, Ordering::Relaxed);
            if packet_id != 0 {
                return packet_id;
            }
        }
    }
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn starts_at_one() {
        let ids = PacketIdAllocator::new();
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 2);
    }

    #[test]
    fn wraps_without_zero() {
        let ids = PacketIdAllocator {
            next: AtomicU16::new(u16::MAX - 1),
        };
        assert_eq!(ids.allocate(), u16::MAX - 1);
        assert_eq!(ids.allocate(), u16::MAX);
        assert_eq!(ids.allocate(), 1);
    }
}
