//! # gridform-io: source readers, schema mapping, folder export
//!
//! The static half of the conversion pipeline:
//!
//! - [`rts`] - readers for the source dataset's CSV tables
//! - [`convert`] - mapping of source rows onto the target component tables
//! - [`pypsa`] - the CSV folder writer and its read-back counterpart
//! - [`validate`] - consistency checks over an exported folder
//!
//! Time-varying attributes (generator availability, load profiles) are
//! reconstructed by the companion `gridform-ts` crate; this crate only
//! checks that its output agrees with the static tables.

pub mod convert;
pub mod pypsa;
pub mod rts;
pub mod validate;

pub use convert::{convert, ConvertOptions, ConvertResult, Rating};
pub use pypsa::{read_csv_folder, write_csv_folder};
pub use rts::{read_source_dir, RtsSource, SeriesPointer};
pub use validate::{validate_folder, ValidationReport};
