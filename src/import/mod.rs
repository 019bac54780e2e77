// # Import Module
//
// Batch image ingestion for image collections:
//
// - **FileKey**: name+size identity of a staged file
// - **Encoder**: turns one file into a data URI without blocking
// - **ConversionTracker**: submits each key once and collects results in any order
// - **Assembler**: validates the draft and builds the create/update payload
// - **Sessions**: the upload modal and the detail page, tying the above to the API
//
// Public API:
// - `UploadSession`: stage files, watch conversions, submit a new collection
// - `ImageDetailSession`: load, edit and prune an existing collection

pub mod assembler;
pub mod batch;
pub mod encoder;
pub mod file_key;
pub mod session;
pub mod tracker;

pub use assembler::{assemble, assemble_update, RecordDraft, SubmitPolicy, ValidationError};
pub use batch::Batch;
pub use encoder::{DataUriEncoder, EncodeError, Encoder};
pub use file_key::{key, FileKey, FileRef};
pub use session::{
    DetailLoad, FileTile, ImageDetailSession, SubmitError, SubmitOutcome, TileStatus,
    UploadSession,
};
pub use tracker::{ConversionState, ConversionTracker, ConversionUpdate};
