//! Command implementations, one module per subcommand.

pub mod discover;
pub mod estimate;
pub mod generate;
pub mod research;
