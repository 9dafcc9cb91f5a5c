pub mod fake_transport;
pub mod observer;

pub use fake_transport::*;
pub use harness::*;
pub use observer::*;

use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}
