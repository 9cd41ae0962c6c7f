//! Tern compiler driver.
//!
//! Ties the middle end together for one compilation:
//!
//! ```text
//! AstContext ──► Session::conforms_to / check_substitutions ──► diagnostics
//!                        │
//! tern_sil::Function ──► Session::verify
//!                        │
//! tern_arc::Module ───► Session::run_arc  (optimize, then expand)
//! ```
//!
//! Front-end work (lexing, parsing, lowering) happens elsewhere; the
//! driver takes already-built declarations and IR.

mod options;
mod session;

pub use options::CompilerOptions;
pub use session::{Session, SessionError};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=tern_arc=debug` or `RUST_LOG=tern_types=trace`;
/// set `TERN_LOG_TREE` as well for indented span trees.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        let registry = tracing_subscriber::registry().with(filter);
        if std::env::var_os("TERN_LOG_TREE").is_some() {
            registry
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .init();
        } else {
            registry
                .with(fmt::layer().with_target(true).with_level(true))
                .init();
        }
    });
}
