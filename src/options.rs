//! Configuration for writers and readers.

/// Default in-memory window budget: 1 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Default chunk size for reads served from the file: 128 KiB.
pub const DEFAULT_HIGH_WATER_MARK: usize = 128 * 1024;

/// Options for a [`TailingWriter`](crate::TailingWriter).
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Byte budget of the in-memory window of recent data.
    pub buffer_size: usize,
}

impl WriterOptions {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Options for a single attached reader.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Chunk size used when catching up from the file.
    pub high_water_mark: usize,
}

impl ReadOptions {
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark.max(1);
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(WriterOptions::default().buffer_size, 1024 * 1024);
        assert_eq!(ReadOptions::default().high_water_mark, 128 * 1024);
    }

    #[test]
    fn test_zero_is_clamped() {
        assert_eq!(WriterOptions::default().with_buffer_size(0).buffer_size, 1);
        assert_eq!(
            ReadOptions::default().with_high_water_mark(0).high_water_mark,
            1
        );
    }
}
