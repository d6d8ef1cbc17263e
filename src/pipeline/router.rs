use std::fmt;

use crate::audio::AudioAsset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Normalized,
    Chunked,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Direct => "direct",
            Route::Normalized => "normalized",
            Route::Chunked => "chunked",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First routing decision, from size and container alone. Oversized files are
/// chunked without trying any format.
pub fn initial_route(asset: &AudioAsset, ceiling_bytes: u64) -> Route {
    if asset.size_bytes() > ceiling_bytes {
        Route::Chunked
    } else if asset.is_supported_format() {
        Route::Direct
    } else {
        Route::Normalized
    }
}
