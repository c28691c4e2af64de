// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::memory::MemoryStore;
use crate::seed::Seed;

pub const DATA_ADMINISTRATOR: &str = "Data Administrator";

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Store with only the wildcard column-group.
pub fn initialized_store() -> MemoryStore {
    let store = MemoryStore::new(DATA_ADMINISTRATOR);
    let mut tx = store.begin();
    tx.ensure_initialized(&Seed::default())
        .expect("initialize empty store");
    tx.commit();
    store
}
