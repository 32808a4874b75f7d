//! Configuration types for output and copy settings

use crate::copy;
use crate::path;

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
}

/// Chunk size selection
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkConfig {
    /// Explicit chunk size in bytes, wins over everything else
    pub chunk_size: Option<u64>,
    /// Destination is known to be a network mount
    pub network: bool,
}

impl ChunkConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        match self.chunk_size {
            Some(0) => Err("chunk size must be at least 1 byte".to_string()),
            Some(size) if usize::try_from(size).is_err() => {
                Err(format!("chunk size {size} does not fit in memory"))
            }
            _ => Ok(()),
        }
    }

    /// Picks the chunk size for copying `src` to `dst`.
    ///
    /// An explicit size wins, then the network flag, then a look at where the files live.
    pub fn settings_for(
        &self,
        src: &std::path::Path,
        dst: &std::path::Path,
    ) -> anyhow::Result<copy::Settings> {
        self.validate().map_err(|error| anyhow::anyhow!(error))?;
        let chunk_size = if let Some(size) = self.chunk_size {
            std::num::NonZeroUsize::try_from(usize::try_from(size)?)?
        } else if self.network {
            copy::NETWORK_CHUNK_SIZE
        } else if path::is_network_location(dst) || path::is_network_location(src) {
            tracing::info!("network location detected, using large chunks");
            copy::NETWORK_CHUNK_SIZE
        } else {
            copy::LOCAL_CHUNK_SIZE
        };
        Ok(copy::Settings { chunk_size })
    }
}
