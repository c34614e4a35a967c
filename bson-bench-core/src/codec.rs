//! Codecs under test
//!
//! Each installed module resolves to a [`Codec`]. The reference codec is the
//! `bson` crate linked into the harness. Other versions ship as native plugins
//! exporting [`CODEC_CREATE_SYMBOL`]:
//!
//! ```ignore
//! #[no_mangle]
//! pub extern "C" fn bson_bench_codec_create() -> *mut dyn Codec {
//!     Box::into_raw(Box::new(MyCodec::default()))
//! }
//! ```
//!
//! Plugins are only ever loaded inside a worker process, one per process.

use crate::module::{BuiltinCodec, CodecEntry, InstalledModule};
use bson::{Bson, Document};
use bson_bench_ipc::OperationOptions;
use std::ops::Deref;
use std::path::Path;
use thiserror::Error;

/// Symbol every codec plugin exports
pub const CODEC_CREATE_SYMBOL: &[u8] = b"bson_bench_codec_create";

/// Plugin constructor signature
pub type CodecCreateFn = unsafe extern "C" fn() -> *mut dyn Codec;

/// Codec failures
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input was a BSON value other than a document
    #[error("top-level value must be a document, found {0:?}")]
    NotADocument(bson::spec::ElementType),

    /// Encoding failed
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// Decoding failed
    #[error("deserialization failed: {0}")]
    Deserialize(String),

    /// Plugin could not be loaded or constructed
    #[error("failed to load codec library {path}: {message}")]
    Load {
        /// Plugin file
        path: String,
        /// Loader or constructor error
        message: String,
    },
}

/// A BSON implementation the harness can time
pub trait Codec: Send {
    /// Human-readable implementation name
    fn name(&self) -> &str;

    /// Encode a top-level document
    fn serialize(&self, document: &Bson, options: &OperationOptions)
        -> Result<Vec<u8>, CodecError>;

    /// Decode a top-level document
    fn deserialize(&self, bytes: &[u8], options: &OperationOptions) -> Result<Bson, CodecError>;
}

/// The `bson` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceCodec;

impl Codec for ReferenceCodec {
    fn name(&self) -> &str {
        "bson"
    }

    fn serialize(
        &self,
        document: &Bson,
        _options: &OperationOptions,
    ) -> Result<Vec<u8>, CodecError> {
        let doc = match document {
            Bson::Document(doc) => doc,
            other => return Err(CodecError::NotADocument(other.element_type())),
        };
        let mut buf = Vec::new();
        doc.to_writer(&mut buf)
            .map_err(|e| CodecError::Serialize(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize(&self, bytes: &[u8], options: &OperationOptions) -> Result<Bson, CodecError> {
        let doc = if options.utf8_validation() {
            bson::from_slice::<Document>(bytes)
        } else {
            bson::from_slice_utf8_lossy::<Document>(bytes)
        }
        .map_err(|e| CodecError::Deserialize(e.to_string()))?;
        Ok(Bson::Document(doc))
    }
}

/// A codec together with the library keeping its code mapped
pub struct LoadedCodec {
    // Dropped before `_library`
    codec: Box<dyn Codec>,
    _library: Option<libloading::Library>,
}

impl LoadedCodec {
    fn builtin(codec: BuiltinCodec) -> Self {
        let codec: Box<dyn Codec> = match codec {
            BuiltinCodec::Reference => Box::new(ReferenceCodec),
        };
        Self {
            codec,
            _library: None,
        }
    }

    /// Load a plugin from disk.
    ///
    /// # Safety
    ///
    /// The library must export [`CODEC_CREATE_SYMBOL`] with the
    /// [`CodecCreateFn`] signature and be built against this crate version.
    unsafe fn plugin(path: &Path) -> Result<Self, CodecError> {
        let load_error = |message: String| CodecError::Load {
            path: path.display().to_string(),
            message,
        };

        let library = libloading::Library::new(path).map_err(|e| load_error(e.to_string()))?;
        let create: CodecCreateFn = *library
            .get::<CodecCreateFn>(CODEC_CREATE_SYMBOL)
            .map_err(|e| load_error(e.to_string()))?;
        Self::construct(create, Some(library)).map_err(load_error)
    }

    /// Run a plugin constructor and take ownership of the codec it returns.
    ///
    /// # Safety
    ///
    /// `create` must return null or a pointer from `Box::into_raw`, and any
    /// code it points into must live inside `library`.
    unsafe fn construct(
        create: CodecCreateFn,
        library: Option<libloading::Library>,
    ) -> Result<Self, String> {
        let raw = create();
        if raw.is_null() {
            return Err("constructor returned null".to_string());
        }
        Ok(Self {
            codec: Box::from_raw(raw),
            _library: library,
        })
    }
}

impl Deref for LoadedCodec {
    type Target = dyn Codec;

    fn deref(&self) -> &Self::Target {
        self.codec.as_ref()
    }
}

/// Resolve the codec an installed module provides
pub fn load_codec(module: &InstalledModule) -> Result<LoadedCodec, CodecError> {
    match module.entry() {
        CodecEntry::Builtin(codec) => Ok(LoadedCodec::builtin(*codec)),
        CodecEntry::Library(path) => {
            tracing::debug!("Loading codec plugin {}", path.display());
            // SAFETY: plugins are produced for this harness and only loaded in
            // a dedicated worker process.
            unsafe { LoadedCodec::plugin(path) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson_bench_ipc::{OptionValue, VALIDATION_OPTION};

    #[test]
    fn test_reference_serialize_matches_bson() {
        let document = doc! { "a": 1_i32, "b": "two", "c": [1_i32, 2_i32] };
        let mut expected = Vec::new();
        document.to_writer(&mut expected).unwrap();

        let bytes = ReferenceCodec
            .serialize(&Bson::Document(document.clone()), &OperationOptions::new())
            .unwrap();
        assert_eq!(bytes, expected);

        let decoded = ReferenceCodec
            .deserialize(&bytes, &OperationOptions::new())
            .unwrap();
        assert_eq!(decoded, Bson::Document(document));
    }

    #[test]
    fn test_top_level_array_rejected() {
        let err = ReferenceCodec
            .serialize(
                &Bson::Array(vec![Bson::Int32(1)]),
                &OperationOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::NotADocument(bson::spec::ElementType::Array)
        ));
    }

    #[test]
    fn test_invalid_utf8_respects_validation_option() {
        // {"s": "\xff"}
        let bytes: Vec<u8> = vec![
            14, 0, 0, 0, 0x02, b's', 0, 2, 0, 0, 0, 0xff, 0, 0,
        ];

        assert!(ReferenceCodec
            .deserialize(&bytes, &OperationOptions::new())
            .is_err());

        let lossy = OperationOptions::new().with(
            VALIDATION_OPTION,
            OptionValue::Utf8Validation(false),
        );
        let decoded = ReferenceCodec.deserialize(&bytes, &lossy).unwrap();
        let Bson::Document(doc) = decoded else {
            panic!("expected document");
        };
        assert_eq!(doc.get_str("s").unwrap(), "\u{fffd}");
    }

    #[test]
    fn test_truncated_input() {
        let err = ReferenceCodec
            .deserialize(&[5, 0, 0], &OperationOptions::new())
            .unwrap_err();
        assert!(matches!(err, CodecError::Deserialize(_)));
    }

    #[allow(improper_ctypes_definitions)]
    extern "C" fn create_reference() -> *mut dyn Codec {
        Box::into_raw(Box::new(ReferenceCodec))
    }

    #[allow(improper_ctypes_definitions)]
    extern "C" fn create_nothing() -> *mut dyn Codec {
        std::ptr::null_mut::<ReferenceCodec>()
    }

    #[test]
    fn test_plugin_constructor_yields_codec() {
        let codec = unsafe { LoadedCodec::construct(create_reference, None) }.unwrap();
        assert_eq!(codec.name(), "bson");

        let document = Bson::Document(doc! { "a": 1_i32 });
        let bytes = codec
            .serialize(&document, &OperationOptions::new())
            .unwrap();
        assert_eq!(
            codec.deserialize(&bytes, &OperationOptions::new()).unwrap(),
            document
        );

        let err = unsafe { LoadedCodec::construct(create_nothing, None) }.err();
        assert_eq!(err.as_deref(), Some("constructor returned null"));
    }

    #[test]
    fn test_missing_plugin_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libnot_a_codec.so");
        std::fs::write(&path, b"not an object file").unwrap();

        let err = unsafe { LoadedCodec::plugin(&path) }.err().unwrap();
        assert!(matches!(err, CodecError::Load { .. }));
    }
}
