pub mod detail;
pub mod extract;
pub mod fields;
pub mod index;

pub use detail::parse_detail;
pub use extract::{complete, extract_summary};
pub use index::parse_index;
