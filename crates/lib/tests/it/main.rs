/*! Integration tests for Grove.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - dispatch: Tests for the Broadcaster, subscription scoping, and pipelines
 * - diff: Tests for the edit-script engine and replay consistency
 * - model: Tests for Forest/Partition mutations and their notifications
 * - registry: Tests for the shared identity registries
 * - replicate: End-to-end replicator pair scenarios (two wired sides)
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("grove=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod diff;
mod dispatch;
mod helpers;
mod model;
mod registry;
mod replicate;
