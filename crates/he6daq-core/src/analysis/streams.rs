use std::collections::BTreeMap;

use crate::StreamSummary;
use crate::packet::PacketHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct StreamKey {
    pub digital_id: u8,
    pub interface_id: u8,
}

#[derive(Debug, Default)]
pub(crate) struct StreamStats {
    pub packets: u64,
    pub batches: u64,
    pub index_gaps: u64,
    pub out_of_order: u64,
    pub time_domain: u64,
    pub freq_domain: u64,
    last: Option<(u32, u32)>,
}

impl StreamStats {
    fn add(&mut self, header: &PacketHeader) {
        self.packets += 1;
        if header.freq_not_time {
            self.freq_domain += 1;
        } else {
            self.time_domain += 1;
        }

        let index = header.packet_index;
        match self.last {
            Some((unix_time, last_index)) if unix_time == header.unix_time => {
                let expected = last_index.wrapping_add(1);
                if index > expected {
                    self.index_gaps += u64::from(index - expected);
                } else if index < expected {
                    self.out_of_order += 1;
                }
            }
            _ => self.batches += 1,
        }
        // Keep the high-water mark so one late packet is not also
        // counted as a gap when the stream resumes.
        let high = match self.last {
            Some((unix_time, last_index)) if unix_time == header.unix_time => last_index.max(index),
            _ => index,
        };
        self.last = Some((header.unix_time, high));
    }
}

pub(crate) fn add_packet(stats: &mut BTreeMap<StreamKey, StreamStats>, header: &PacketHeader) {
    let key = StreamKey {
        digital_id: header.digital_id,
        interface_id: header.interface_id,
    };
    stats.entry(key).or_default().add(header);
}

pub(crate) fn build_stream_summaries(stats: BTreeMap<StreamKey, StreamStats>) -> Vec<StreamSummary> {
    stats
        .into_iter()
        .map(|(key, stats)| StreamSummary {
            digital_id: key.digital_id,
            interface_id: key.interface_id,
            packets: stats.packets,
            batches: stats.batches,
            index_gaps: stats.index_gaps,
            out_of_order: stats.out_of_order,
            time_domain: stats.time_domain,
            freq_domain: stats.freq_domain,
        })
        .collect()
}
