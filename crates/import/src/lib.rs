pub mod columns;
pub mod normalize;
pub mod registry;
pub mod table;
pub(crate) mod util;

pub use columns::{resolve, resolve_disclosure, DisclosureColumns, Field, MatchRule, ResolvedColumns};
pub use normalize::{normalize, normalize_table, Skip};
pub use registry::{parse_registry, registry_from_table, RegistryError};
pub use table::{read_archive, read_csv, read_table, read_xlsx, ArchiveEntry, Cell, RawTable, TableError};
