//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and transcode. Transcode covers both the main-file
//! format conversion and the resize-then-encode used for responsive variants.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the pure-Rust
//! codecs of the `image` crate. No system libraries are involved.

use super::params::TranscodeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// What a transcode produced on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedOutput {
    pub width: u32,
    pub height: u32,
    /// Size of the written file in bytes.
    pub bytes: u64,
}

/// Trait for image processing backends.
///
/// Implementations must not leave a partially written output file behind
/// when decoding or encoding fails: the output path is only touched once a
/// complete encoded buffer exists.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode `params.source`, apply the optional resize, encode with
    /// `params.settings` and write the result to `params.output`.
    fn transcode(&self, params: &TranscodeParams) -> Result<EncodedOutput, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{EncodeSettings, Quality, ResizeSpec, WebpSettings};
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Interior state is behind `Mutex` so the mock is `Sync` under rayon.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        /// Zero-based index of the transcode call that should fail.
        pub fail_transcode_at: Option<usize>,
        pub fail_identify: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Transcode {
            source: String,
            output: String,
            resize: Option<ResizeSpec>,
            settings: EncodeSettings,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                ..Self::default()
            }
        }

        pub fn failing_transcode_at(dims: Vec<Dimensions>, index: usize) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                fail_transcode_at: Some(index),
                ..Self::default()
            }
        }

        pub fn failing_identify() -> Self {
            Self {
                fail_identify: true,
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn transcode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Transcode { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            if self.fail_identify {
                return Err(BackendError::Decode(format!(
                    "Failed to decode {}: unexpected end of file",
                    path.display()
                )));
            }

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::Decode("No mock dimensions".to_string()))
        }

        fn transcode(&self, params: &TranscodeParams) -> Result<EncodedOutput, BackendError> {
            let mut ops = self.operations.lock().unwrap();
            let index = ops
                .iter()
                .filter(|op| matches!(op, RecordedOp::Transcode { .. }))
                .count();
            ops.push(RecordedOp::Transcode {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                resize: params.resize,
                settings: params.settings,
            });

            if self.fail_transcode_at == Some(index) {
                return Err(BackendError::Encode(format!(
                    "mock failure writing {}",
                    params.output.display()
                )));
            }

            let (width, height) = params.resize.map(|r| r.dimensions()).unwrap_or((0, 0));
            Ok(EncodedOutput {
                width,
                height,
                bytes: 1024,
            })
        }
    }

    fn webp_settings() -> EncodeSettings {
        EncodeSettings::Webp(WebpSettings {
            quality: Quality::new(80),
            lossless: false,
            effort: 4,
        })
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_records_transcode() {
        let backend = MockBackend::new();

        let out = backend
            .transcode(&TranscodeParams {
                source: "/source.jpg".into(),
                output: "/source-small.webp".into(),
                resize: Some(ResizeSpec::Scale {
                    width: 500,
                    height: 375,
                }),
                settings: webp_settings(),
            })
            .unwrap();
        assert_eq!((out.width, out.height), (500, 375));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Transcode { output, resize: Some(_), .. } if output == "/source-small.webp"
        ));
    }

    #[test]
    fn mock_fails_requested_transcode() {
        let backend = MockBackend::failing_transcode_at(vec![], 1);
        let params = TranscodeParams {
            source: "/a.jpg".into(),
            output: "/a.webp".into(),
            resize: None,
            settings: webp_settings(),
        };
        assert!(backend.transcode(&params).is_ok());
        assert!(matches!(
            backend.transcode(&params),
            Err(BackendError::Encode(_))
        ));
        assert_eq!(backend.transcode_count(), 2);
    }
}
