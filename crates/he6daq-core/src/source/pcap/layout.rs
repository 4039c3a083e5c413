pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

// Large enough for a full jumbo frame carrying one data packet.
pub const PCAP_READER_BUFFER_SIZE: usize = 65536;
