pub mod store;
pub mod util;

pub use store::JsonDirStorage;
pub use util::{run_store_dir, split_csv};
