use crate::codec::encode_record;
use crate::domain::{BatchMeta, Payload};
use uuid::Uuid;

/// Buffer size at which an append wakes the sender.
pub const MIN_SIGNAL_SIZE: usize = 1024;
/// Growth since the last cut that triggers a new cut.
pub const CUTTING_THRESHOLD: usize = 100 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub min_signal_size: usize,
    pub cutting_threshold: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_signal_size: MIN_SIGNAL_SIZE,
            cutting_threshold: CUTTING_THRESHOLD,
        }
    }
}

/// Encoded records plus the metadata shared by every file cut from them.
///
/// Cut positions are strictly increasing offsets no greater than the buffer
/// length; they mark where the buffer may be split into separate queue files.
#[derive(Debug, Clone)]
pub struct Batch {
    meta: BatchMeta,
    data: Vec<u8>,
    cut_positions: Vec<usize>,
}

impl Batch {
    pub fn new(meta: BatchMeta) -> Self {
        Self {
            meta,
            data: Vec::new(),
            cut_positions: Vec::new(),
        }
    }

    pub fn meta(&self) -> &BatchMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut BatchMeta {
        &mut self.meta
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn cut_positions(&self) -> &[usize] {
        &self.cut_positions
    }

    /// Appends one record and updates the cut list. Returns `true` when the
    /// buffer is large enough that the sender should be woken.
    pub fn append(&mut self, code: u16, payload: &Payload, config: &BatchConfig) -> bool {
        encode_record(&mut self.data, code, payload);
        self.maybe_cut(config);
        self.data.len() >= config.min_signal_size
    }

    fn maybe_cut(&mut self, config: &BatchConfig) {
        let len = self.data.len();
        let last_cut = self.cut_positions.last().copied().unwrap_or(0);
        if len >= config.min_signal_size && len - last_cut >= config.cutting_threshold {
            self.cut_positions.push(len);
        }
    }

    /// Clears the buffer for reuse as the active side.
    pub fn reset(&mut self, user_id: Uuid, start_time: u32) {
        self.data.clear();
        self.cut_positions.clear();
        self.meta.user_id = user_id;
        self.meta.start_time = start_time;
        self.meta.end_time = 0;
        self.meta.batch_num = 0;
    }

    /// Splits the buffer at its cut positions. A trailing empty remainder is
    /// omitted; concatenating the segments yields the whole buffer.
    pub fn segments(&self) -> Vec<&[u8]> {
        let mut segments = Vec::with_capacity(self.cut_positions.len() + 1);
        let mut start = 0;
        for &cut in &self.cut_positions {
            segments.push(&self.data[start..cut]);
            start = cut;
        }
        if start < self.data.len() {
            segments.push(&self.data[start..]);
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_records;
    use crate::domain::{EventKind, EventRecord};

    fn batch() -> Batch {
        Batch::new(BatchMeta::new(Uuid::new_v4(), Uuid::nil(), Uuid::new_v4()))
    }

    fn small_config() -> BatchConfig {
        BatchConfig {
            min_signal_size: 16,
            cutting_threshold: 64,
        }
    }

    #[test]
    fn test_small_buffer_does_not_signal_or_cut() {
        let mut batch = batch();
        let config = BatchConfig::default();
        let signalled = batch.append(EventKind::ButtonClick.code(), &Payload::from("x"), &config);

        assert!(!signalled);
        assert!(batch.cut_positions().is_empty());
        assert_eq!(batch.segments(), vec![batch.data()]);
    }

    #[test]
    fn test_signal_once_min_size_reached() {
        let mut batch = batch();
        let config = BatchConfig::default();
        let payload = Payload::from("y".repeat(1100));

        assert!(batch.append(EventKind::ErrorMsg.code(), &payload, &config));
    }

    #[test]
    fn test_cut_positions_increase_and_rebuild_buffer() {
        let mut batch = batch();
        let config = small_config();
        for i in 0..100 {
            batch.append(EventKind::SceneLoaded.code(), &Payload::from(format!("scene-{i}")), &config);
        }

        let cuts = batch.cut_positions();
        assert!(!cuts.is_empty());
        assert!(cuts.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(cuts.iter().all(|&cut| cut <= batch.len()));

        let rebuilt: Vec<u8> = batch.segments().concat();
        assert_eq!(rebuilt, batch.data());
    }

    #[test]
    fn test_every_segment_decodes_on_its_own() {
        let mut batch = batch();
        let config = small_config();
        let mut expected = Vec::new();
        for i in 0..40u32 {
            let record = EventRecord::new(EventKind::PurchaseProductPriceUsdCents, Payload::U32(i));
            batch.append(record.code, &record.payload, &config);
            expected.push(record);
        }

        let mut decoded = Vec::new();
        for segment in batch.segments() {
            decoded.extend(decode_records(segment, None).unwrap());
        }
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_reset_clears_data_and_stamps_meta() {
        let mut batch = batch();
        let config = small_config();
        for _ in 0..20 {
            batch.append(EventKind::LowMemWarning.code(), &Payload::Empty, &config);
        }
        let user = Uuid::new_v4();
        batch.reset(user, 1234);

        assert!(batch.is_empty());
        assert!(batch.cut_positions().is_empty());
        assert_eq!(batch.meta().user_id, user);
        assert_eq!(batch.meta().start_time, 1234);
        assert!(batch.segments().is_empty());
    }
}
