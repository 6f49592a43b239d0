//! Reference adapter implementations.

pub mod header;
pub mod supabase;

pub use header::{HeaderAdapter, HeaderAdapterConfig};
pub use supabase::{SupabaseAdapter, SupabaseConfig};
