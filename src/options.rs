/// Knobs for decoding a directory stream.
///
/// Deserializable with every field optional, so hosts can embed it in their own
/// configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Check that every sorted run handed to the merger, and the final listing,
    /// is strictly increasing by name. Costs one extra pass over each run, so it
    /// is off unless asked for.
    #[serde(rename = "verifyOrder")]
    pub verify_order: bool,
    /// Largest single record, in bytes, the stream reader will buffer.
    #[serde(rename = "maxRecordSize")]
    pub max_record_size: usize,
}

pub const DEFAULT_MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            verify_order: false,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        DecodeOptions {
            verify_order: true,
            ..Default::default()
        }
    }

    pub fn with_max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }
}
