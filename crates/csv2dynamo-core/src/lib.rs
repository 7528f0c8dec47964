// csv2dynamo-core - Platform-agnostic loader logic
//
// Everything the CSV loader does that does not touch AWS lives here:
// - Trigger payload validation (S3 create notifications)
// - Object key decoding
// - CSV to record conversion
// - The response contract returned to the invoker

pub mod error;
pub mod event;
pub mod response;
pub mod rows;

pub use error::{ErrorCode, LoaderError, Result};
pub use event::{decode_object_key, parse_trigger, scratch_file_name, NotificationRecord};
pub use response::{LoaderResponse, MALFORMED_MESSAGE, SUCCESS_MESSAGE};
pub use rows::{parse_csv, Record};
